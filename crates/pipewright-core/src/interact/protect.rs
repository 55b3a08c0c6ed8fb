//! Protected-point test: coordinates interactive edits must not move into.

use super::{PROTECT_PLAN_TOLERANCE, PROTECT_Z_TOLERANCE};
use crate::geom::points_coincide;
use crate::network::{ENDPOINT_JOIN_TOLERANCE, Fitting, PipeEnd, PipeId, PipeNetwork};
use glam::DVec3;

/// Exclusions applied while testing a point. The endpoint being moved and
/// everything riding along with it must not protect its own destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectedPointQuery {
    /// The pipe endpoint being moved, if any.
    pub exclude_pipe: Option<(PipeId, PipeEnd)>,
    /// Pre-move position of the moving endpoint; coincident endpoints there
    /// travel with the drag and do not count.
    pub exclude_origin: Option<DVec3>,
    /// Suppress the foreign-free-endpoint clause (callers that run their own
    /// finer-grained endpoint collision check).
    pub suppress_free_endpoints: bool,
}

/// True when `point` coincides with a topological role interactive edits may
/// not disturb: a service-box outlet, a meter inlet/outlet, a device inlet,
/// a junction of other pipes, or (unless suppressed) a foreign free endpoint.
///
/// Pure query: two calls on the same network and arguments agree.
pub fn is_protected_point(
    network: &PipeNetwork,
    point: DVec3,
    query: &ProtectedPointQuery,
) -> bool {
    // Ports sitting on the drag origin ride along with the move and must not
    // protect their own destination.
    let rides_along = |port: DVec3| {
        query.exclude_origin.is_some_and(|origin| {
            points_coincide(port, origin, ENDPOINT_JOIN_TOLERANCE, ENDPOINT_JOIN_TOLERANCE)
        })
    };
    let near = |other: DVec3| {
        !rides_along(other)
            && points_coincide(point, other, PROTECT_PLAN_TOLERANCE, PROTECT_Z_TOLERANCE)
    };

    for fitting in network.fittings() {
        match fitting {
            Fitting::ServiceBox(s) => {
                if near(s.outlet_point()) {
                    return true;
                }
            }
            Fitting::Meter(m) => {
                if near(m.inlet_point()) || near(m.outlet_point()) {
                    return true;
                }
            }
            Fitting::Device(d) => {
                if d.inlet.is_some()
                    && network.inlet_position(d.id).is_some_and(near)
                {
                    return true;
                }
            }
            _ => {}
        }
    }

    // Pipe endpoints at the target, minus the moving endpoint and anything
    // coincident with its pre-move position.
    let foreign: Vec<(PipeId, PipeEnd)> = network
        .endpoints_at(point, PROTECT_PLAN_TOLERANCE)
        .into_iter()
        .filter(|&(pid, end)| query.exclude_pipe != Some((pid, end)))
        .filter(|&(pid, end)| {
            let Some(pipe) = network.pipe(pid) else {
                return false;
            };
            match query.exclude_origin {
                Some(origin) => !points_coincide(
                    pipe.endpoint(end),
                    origin,
                    ENDPOINT_JOIN_TOLERANCE,
                    ENDPOINT_JOIN_TOLERANCE,
                ),
                None => true,
            }
        })
        .collect();

    if foreign.len() >= 2 {
        // A junction of other pipes.
        return true;
    }
    if !foreign.is_empty() && !query.suppress_free_endpoints {
        // A dangling end of another pipe.
        return true;
    }
    false
}
