//! Fitting rotation. Meters pivot around their inlet port so the flexible
//! connection stays put while the rigid outlet swings.

use crate::network::{ENDPOINT_JOIN_TOLERANCE, Fitting, FittingId, Meter, PipeNetwork};
use glam::DVec3;

/// Rotate a fitting to the absolute angle `rotation` (radians). For a meter
/// the inlet point is held fixed and the outlet chain is re-synced; every
/// other variant just pivots in place.
pub fn rotate_fitting(network: &mut PipeNetwork, fitting_id: FittingId, rotation: f64) -> bool {
    match network.fitting(fitting_id) {
        Some(Fitting::Meter(m)) => {
            let inlet = m.inlet_point();
            rotate_meter_about(network, fitting_id, inlet, rotation)
        }
        Some(_) => {
            if let Some(f) = network.fitting_mut(fitting_id) {
                f.set_rotation(rotation);
            }
            true
        }
        None => {
            log::warn!("rotate on missing fitting {fitting_id}");
            false
        }
    }
}

/// Fixed-pivot meter rotation: re-solves the center strictly from the
/// current inlet location, trusting it over the stored position when the
/// two disagree (the flexible inlet absorbs the residual).
pub fn rotate_meter_fixed_pivot(
    network: &mut PipeNetwork,
    meter_id: FittingId,
    rotation: f64,
) -> bool {
    let inlet = match network.fitting(meter_id) {
        Some(Fitting::Meter(m)) => match m.inlet.and_then(|c| {
            network.pipe(c.pipe).map(|p| p.endpoint(c.end))
        }) {
            Some(p) => p,
            // No inlet pipe: fall back to the port derived from state.
            None => m.inlet_point(),
        },
        _ => {
            log::warn!("fixed-pivot rotate on missing meter {meter_id}");
            return false;
        }
    };
    rotate_meter_about(network, meter_id, inlet, rotation)
}

/// Reorient a meter so its inlet port lands on `inlet`, then pin the rigid
/// outlet pipe (and anything chained at the old outlet point) to the new
/// outlet location.
fn rotate_meter_about(
    network: &mut PipeNetwork,
    meter_id: FittingId,
    inlet: DVec3,
    rotation: f64,
) -> bool {
    let old_outlet = match network.fitting(meter_id).and_then(Fitting::as_meter) {
        Some(m) => m.outlet_point(),
        None => return false,
    };
    let center = Meter::center_for_inlet(inlet, rotation);
    let new_outlet = {
        let Some(Fitting::Meter(m)) = network.fitting_mut(meter_id) else {
            return false;
        };
        m.position = center;
        m.rotation = rotation;
        m.outlet_point()
    };

    // Everything attached at the old outlet follows it; the outlet pipe's
    // start is pinned exactly even if it had drifted.
    let attached = network.endpoints_at(old_outlet, ENDPOINT_JOIN_TOLERANCE);
    for (pid, pend) in attached {
        if let Some(p) = network.pipe_mut(pid) {
            p.set_endpoint(pend, new_outlet);
        }
    }
    let outlet_pipe = network
        .fitting(meter_id)
        .and_then(Fitting::as_meter)
        .and_then(|m| m.outlet_pipe);
    if let Some(pid) = outlet_pipe {
        if let Some(p) = network.pipe_mut(pid) {
            p.p1 = new_outlet;
        }
    }
    network.refresh_end_caps();
    true
}
