//! Fitting placement: attaching meters and devices to free pipe endpoints,
//! mid-span placement via split, and corner-aware split entry points.

use crate::network::{
    Chimney, Device, ENDPOINT_JOIN_TOLERANCE, Fitting, FittingId, FixedAnchor, FlexConnection,
    Meter, NetworkError, NetworkResult, PipeEnd, PipeId, PipeNetwork, SPLIT_CORNER_THRESHOLD,
    VALVE_EDGE_CLEARANCE, VALVE_WIDTH, Valve, expect_variant,
};
use glam::DVec3;

/// Distance from a pipe end at which an auto-created valve is planted.
pub const AUTO_VALVE_OFFSET: f64 = VALVE_WIDTH / 2.0 + VALVE_EDGE_CLEARANCE;

/// Split a pipe at an interior point, unless the point sits within
/// [`SPLIT_CORNER_THRESHOLD`] of one of the pipe's own corners; such a split
/// is refused (`None`) so the caller can branch from the corner instead.
/// Off-segment points and unknown pipes still fail fast.
pub fn split_pipe(
    network: &mut PipeNetwork,
    pipe_id: PipeId,
    point: DVec3,
) -> NetworkResult<Option<(PipeId, PipeId)>> {
    let pipe = network
        .pipe(pipe_id)
        .ok_or(NetworkError::UnknownPipe(pipe_id))?;
    if (point - pipe.p1).length() < SPLIT_CORNER_THRESHOLD
        || (point - pipe.p2).length() < SPLIT_CORNER_THRESHOLD
    {
        return Ok(None);
    }
    network.split_at(pipe_id, point).map(Some)
}

/// Attach a meter to the free endpoint at `point`. The endpoint must be
/// touched by exactly one pipe and carry no meter or device yet; a valve is
/// auto-created near the end when the end region has none. Returns the new
/// meter's id, or `None` when the point is not a legal attachment site.
pub fn attach_meter(network: &mut PipeNetwork, point: DVec3) -> Option<FittingId> {
    let (pipe_id, end) = free_attachment_site(network, point)?;
    Some(attach_meter_to_end(network, pipe_id, end))
}

/// Attach a device (consuming appliance) to the free endpoint at `point`.
/// Same occupancy rules as [`attach_meter`].
pub fn attach_device(network: &mut PipeNetwork, point: DVec3) -> Option<FittingId> {
    let (pipe_id, end) = free_attachment_site(network, point)?;
    Some(attach_device_to_end(network, pipe_id, end))
}

/// Place a meter mid-span: split the pipe at `point` and attach the meter to
/// the first half's new end as if it were a free endpoint. Occupancy is
/// checked up front so a refused placement never splits the pipe.
pub fn place_meter_mid_span(
    network: &mut PipeNetwork,
    pipe_id: PipeId,
    point: DVec3,
) -> NetworkResult<Option<FittingId>> {
    if occupied(network, point) {
        return Ok(None);
    }
    let Some((first, _)) = split_pipe(network, pipe_id, point)? else {
        return Ok(None);
    };
    Ok(Some(attach_meter_to_end(network, first, PipeEnd::End)))
}

/// Place a device mid-span via split, like [`place_meter_mid_span`].
pub fn place_device_mid_span(
    network: &mut PipeNetwork,
    pipe_id: PipeId,
    point: DVec3,
) -> NetworkResult<Option<FittingId>> {
    if occupied(network, point) {
        return Ok(None);
    }
    let Some((first, _)) = split_pipe(network, pipe_id, point)? else {
        return Ok(None);
    };
    Ok(Some(attach_device_to_end(network, first, PipeEnd::End)))
}

/// Give a device an exhaust chimney. At most one per device; returns the
/// existing one's id when already present.
pub fn attach_chimney(network: &mut PipeNetwork, device_id: FittingId) -> NetworkResult<FittingId> {
    let device = expect_variant(network, device_id, "device", Fitting::as_device)?;
    if let Some(existing) = device.chimney {
        return Ok(existing);
    }
    let chimney = Chimney::new(device.position, device.floor_id, device_id);
    let chimney_id = network.add_fitting(Fitting::Chimney(chimney));
    if let Some(Fitting::Device(d)) = network.fitting_mut(device_id) {
        d.chimney = Some(chimney_id);
    }
    Ok(chimney_id)
}

/// Resolve `point` to a legal free attachment site: exactly one coincident
/// pipe endpoint and no meter or device there yet.
fn free_attachment_site(network: &PipeNetwork, point: DVec3) -> Option<(PipeId, PipeEnd)> {
    if !network.is_free_endpoint(point, ENDPOINT_JOIN_TOLERANCE) || occupied(network, point) {
        return None;
    }
    network
        .endpoints_at(point, ENDPOINT_JOIN_TOLERANCE)
        .into_iter()
        .next()
}

fn occupied(network: &PipeNetwork, point: DVec3) -> bool {
    network.has_meter_at(point, ENDPOINT_JOIN_TOLERANCE)
        || network.has_device_at(point, ENDPOINT_JOIN_TOLERANCE)
}

fn attach_meter_to_end(network: &mut PipeNetwork, pipe_id: PipeId, end: PipeEnd) -> FittingId {
    let (point, rotation, floor_id) = end_frame(network, pipe_id, end);
    let valve = ensure_end_valve(network, pipe_id, end);

    let mut meter = Meter::new(Meter::center_for_inlet(point, rotation), floor_id);
    meter.rotation = rotation;
    meter.inlet = Some(FlexConnection { pipe: pipe_id, end });
    meter.valve = Some(valve);
    let id = network.add_fitting(Fitting::Meter(meter));
    network.refresh_end_caps();
    id
}

fn attach_device_to_end(network: &mut PipeNetwork, pipe_id: PipeId, end: PipeEnd) -> FittingId {
    let (point, rotation, floor_id) = end_frame(network, pipe_id, end);
    let valve = ensure_end_valve(network, pipe_id, end);

    let mut device = Device::new(point, floor_id);
    device.rotation = rotation;
    device.inlet = Some(FlexConnection { pipe: pipe_id, end });
    device.valve = Some(valve);
    let id = network.add_fitting(Fitting::Device(device));
    network.refresh_end_caps();
    id
}

/// Attachment frame at a pipe end: the endpoint, the plan-plane angle of the
/// pipe continuing outward through it, and the floor.
fn end_frame(network: &PipeNetwork, pipe_id: PipeId, end: PipeEnd) -> (DVec3, f64, u32) {
    match network.pipe(pipe_id) {
        Some(pipe) => {
            let point = pipe.endpoint(end);
            let inward = pipe.endpoint(end.opposite());
            let out = point - inward;
            let rotation = if out.length_squared() < f64::EPSILON {
                0.0
            } else {
                out.y.atan2(out.x)
            };
            (point, rotation, pipe.floor_id)
        }
        None => (DVec3::ZERO, 0.0, 0),
    }
}

/// The valve guarding the given pipe end: an existing valve inside the end
/// region if there is one, otherwise a new fixed-anchor valve at
/// [`AUTO_VALVE_OFFSET`] from the end.
fn ensure_end_valve(network: &mut PipeNetwork, pipe_id: PipeId, end: PipeEnd) -> FittingId {
    let Some(pipe) = network.pipe(pipe_id).cloned() else {
        return orphan_valve(network, pipe_id, end);
    };
    let end_region = pipe.category.edge_margin() + VALVE_WIDTH;
    for valve_id in network.valves_on_pipe(pipe_id) {
        if let Some(v) = network.fitting(valve_id).and_then(Fitting::as_valve) {
            if (v.position - pipe.endpoint(end)).length() <= end_region {
                return valve_id;
            }
        }
    }

    let t = pipe.t_at_distance(end, AUTO_VALVE_OFFSET);
    let mut valve = Valve::new(pipe.point_at(t), pipe.floor_id);
    valve.attached_pipe = Some(pipe_id);
    valve.t = t;
    valve.anchor = Some(FixedAnchor {
        from_end: end,
        distance: AUTO_VALVE_OFFSET,
    });
    if let Some(dir) = pipe.direction() {
        valve.rotation = dir.y.atan2(dir.x);
    }
    network.add_fitting(Fitting::Valve(valve))
}

// Unreachable in practice: attachment sites are resolved from live pipes.
fn orphan_valve(network: &mut PipeNetwork, pipe_id: PipeId, end: PipeEnd) -> FittingId {
    log::warn!("valve requested for missing pipe {pipe_id} ({end:?})");
    network.add_fitting(Fitting::Valve(Valve::new(DVec3::ZERO, 0)))
}
