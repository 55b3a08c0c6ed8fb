//! Sliding a valve along its pipe with edge margins and overlap resolution.

use crate::network::{Fitting, FittingId, PipeNetwork};
use glam::DVec3;

/// Move a valve along its owning pipe toward `cursor`. The cursor is
/// projected onto the pipe, clamped away from both ends by the pipe's edge
/// margin, then pushed off any other valve already occupying the slot.
/// Returns false (leaving the valve where it was) when no legal position
/// exists.
pub fn slide_valve(network: &mut PipeNetwork, valve_id: FittingId, cursor: DVec3) -> bool {
    let Some(valve) = network.fitting(valve_id).and_then(Fitting::as_valve) else {
        log::warn!("slide on missing valve {valve_id}");
        return false;
    };
    let Some(pipe_id) = valve.attached_pipe else {
        return false;
    };
    let Some(pipe) = network.pipe(pipe_id).cloned() else {
        log::warn!("valve {valve_id} attached to missing pipe {pipe_id}");
        return false;
    };
    let len = pipe.length();
    if len < f64::EPSILON {
        return false;
    }

    let half = valve.footprint() / 2.0;
    let lo = (pipe.category.edge_margin() + half) / len;
    let hi = 1.0 - lo;
    if lo > hi {
        return false;
    }

    // Other valves on the same pipe, as (t, minimum normalized separation).
    let occupants: Vec<(f64, f64)> = network
        .valves_on_pipe(pipe_id)
        .into_iter()
        .filter(|&id| id != valve_id)
        .filter_map(|id| network.fitting(id).and_then(Fitting::as_valve))
        .map(|other| (other.t, (other.footprint() / 2.0 + half) / len))
        .collect();

    let (desired, _) = pipe.project(cursor);
    let desired = desired.clamp(lo, hi);
    let Some(t) = resolve_slot(desired, lo, hi, &occupants) else {
        return false;
    };

    let position = pipe.point_at(t);
    if let Some(Fitting::Valve(v)) = network.fitting_mut(valve_id) {
        v.t = t;
        v.position = position;
        if let Some(anchor) = v.anchor.as_mut() {
            anchor.distance = match anchor.from_end {
                crate::network::PipeEnd::Start => t * len,
                crate::network::PipeEnd::End => (1.0 - t) * len,
            };
        }
    }
    true
}

/// Find the legal position nearest to `desired` within `[lo, hi]` that keeps
/// the required separation from every occupant: `desired` itself when free,
/// otherwise the closer flank of a conflicting occupant.
fn resolve_slot(desired: f64, lo: f64, hi: f64, occupants: &[(f64, f64)]) -> Option<f64> {
    let conflicts =
        |t: f64| occupants.iter().any(|&(ot, gap)| (t - ot).abs() < gap - 1e-12);
    if !conflicts(desired) {
        return Some(desired);
    }

    let mut best: Option<f64> = None;
    for &(ot, gap) in occupants {
        for candidate in [ot - gap, ot + gap] {
            if candidate < lo || candidate > hi || conflicts(candidate) {
                continue;
            }
            let better = match best {
                Some(b) => (candidate - desired).abs() < (b - desired).abs(),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best
}
