//! Body drag: translating a pipe by a non-endpoint grab point, perpendicular
//! to its own principal axis, in one of three reconciliation modes.

use super::{
    CHAIN_PARALLEL_TOLERANCE_DEG, ENDPOINT_COLLISION_TOLERANCE, GhostPipe, InteractionState,
    JUNCTION_COLLISION_TOLERANCE,
};
use crate::geom::{self, Axis, points_coincide};
use crate::network::{
    Connection, ConnectionKind, ENDPOINT_JOIN_TOLERANCE, Fitting, FittingId, Pipe, PipeEnd,
    PipeId, PipeNetwork,
};
use glam::DVec3;

/// One side of a bridge-mode drag: the neighbor pipe, its endpoint at the
/// former junction, and the junction's (fixed) position.
#[derive(Debug, Clone, Copy)]
pub struct BridgeAnchor {
    pub neighbor: PipeId,
    pub neighbor_end: PipeEnd,
    pub point: DVec3,
}

/// How a body drag reconciles the dragged pipe with its surroundings.
#[derive(Debug, Clone)]
pub enum BodyDragMode {
    /// No colinear neighbors: the pipe translates and any endpoints joined
    /// to it stretch along.
    Free,
    /// A colinear run translates as a unit, carrying its cross-connections.
    /// Holds every pipe in the run, the dragged one included.
    Chain(Vec<PipeId>),
    /// Exactly one single-connected colinear neighbor per end: junction
    /// points stay fixed and connector pipes are synthesized on release.
    Bridge {
        start: BridgeAnchor,
        end: BridgeAnchor,
    },
}

/// Descriptor of an active body drag.
#[derive(Debug, Clone)]
pub struct BodyDrag {
    pub pipe: PipeId,
    /// Grab point when the drag started.
    pub grab: DVec3,
    /// Dragged pipe's endpoints when the drag started.
    pub origin_p1: DVec3,
    pub origin_p2: DVec3,
    pub mode: BodyDragMode,
}

/// Start a body drag, classifying the reconciliation mode from the topology
/// around the pipe.
pub fn begin_body_drag(
    network: &PipeNetwork,
    state: &mut InteractionState,
    pipe_id: PipeId,
    grab: DVec3,
) -> bool {
    if state.is_dragging {
        return false;
    }
    let Some(pipe) = network.pipe(pipe_id) else {
        log::warn!("body drag on missing pipe {pipe_id}");
        return false;
    };
    let mode = classify(network, pipe);
    state.clear_drag();
    state.body_drag = Some(BodyDrag {
        pipe: pipe_id,
        grab,
        origin_p1: pipe.p1,
        origin_p2: pipe.p2,
        mode,
    });
    state.is_dragging = true;
    true
}

/// Move the dragged pipe toward `target`. The translation is confined to the
/// axes perpendicular to the pipe's principal axis; a rejected move returns
/// false and leaves the network untouched.
pub fn update_body_drag(
    network: &mut PipeNetwork,
    state: &mut InteractionState,
    target: DVec3,
) -> bool {
    let Some(drag) = state.body_drag.clone() else {
        return false;
    };
    let Some(pipe) = network.pipe(drag.pipe) else {
        state.clear_drag();
        return false;
    };

    let principal = pipe.principal_axis();
    let mut delta = principal.suppress(target - drag.grab);
    if state.axis_mode {
        let axis = state.locked_axis.unwrap_or_else(|| Axis::dominant(delta));
        if axis == principal {
            return false;
        }
        delta = axis.unit() * delta.dot(axis.unit());
    }

    let dest_p1 = drag.origin_p1 + delta;
    let dest_p2 = drag.origin_p2 + delta;
    let step = dest_p1 - pipe.p1;

    match &drag.mode {
        BodyDragMode::Free => translate_group(network, &[drag.pipe], step),
        BodyDragMode::Chain(chain) => translate_group(network, chain, step),
        BodyDragMode::Bridge { start, end } => {
            if !bridge_destination_clear(network, drag.pipe, start, end, dest_p1, dest_p2) {
                return false;
            }
            if let Some(p) = network.pipe_mut(drag.pipe) {
                p.p1 = dest_p1;
                p.p2 = dest_p2;
            }
            translate_valves_on(network, drag.pipe, step);
            state.ghost_bridges = vec![
                GhostPipe {
                    p1: start.point,
                    p2: dest_p1,
                },
                GhostPipe {
                    p1: end.point,
                    p2: dest_p2,
                },
            ];
            network.refresh_end_caps();
            true
        }
    }
}

/// End the drag. In bridge mode this is where the connector pipes are
/// synthesized; the other modes have nothing left to commit.
pub fn finish_body_drag(network: &mut PipeNetwork, state: &mut InteractionState) {
    let drag = state.body_drag.clone();
    state.clear_drag();
    let Some(drag) = drag else {
        return;
    };
    let BodyDragMode::Bridge { start, end } = drag.mode else {
        return;
    };
    let Some(pipe) = network.pipe(drag.pipe).cloned() else {
        return;
    };
    // No displacement means the junctions are still intact.
    if points_coincide(pipe.p1, start.point, ENDPOINT_JOIN_TOLERANCE, ENDPOINT_JOIN_TOLERANCE)
        && points_coincide(pipe.p2, end.point, ENDPOINT_JOIN_TOLERANCE, ENDPOINT_JOIN_TOLERANCE)
    {
        return;
    }
    // Connectors are valveless, so their minimum is the bare edge margins.
    // A gap too short to hold one snaps the pipe back onto the junctions.
    let connector_min = 2.0 * pipe.category.edge_margin();
    if (pipe.p1 - start.point).length() < connector_min
        || (pipe.p2 - end.point).length() < connector_min
    {
        log::debug!(
            "bridge drag on {} snapped back: gap below connector minimum",
            pipe.id
        );
        let step = start.point - pipe.p1;
        if let Some(p) = network.pipe_mut(drag.pipe) {
            p.p1 = start.point;
            p.p2 = end.point;
        }
        translate_valves_on(network, drag.pipe, step);
        network.refresh_end_caps();
        return;
    }
    synthesize_bridge(network, &pipe, PipeEnd::Start, &start);
    synthesize_bridge(network, &pipe, PipeEnd::End, &end);
    network.refresh_end_caps();
}

/// Decide the reconciliation mode for a body drag of `pipe`.
fn classify(network: &PipeNetwork, pipe: &Pipe) -> BodyDragMode {
    let at_start = neighbors_at(network, pipe, PipeEnd::Start);
    let at_end = neighbors_at(network, pipe, PipeEnd::End);
    if at_start.is_empty() && at_end.is_empty() {
        return BodyDragMode::Free;
    }

    if let (&[(s_id, s_end)], &[(e_id, e_end)]) = (at_start.as_slice(), at_end.as_slice()) {
        let start_ok = bridge_neighbor_ok(network, pipe, s_id, s_end);
        let end_ok = bridge_neighbor_ok(network, pipe, e_id, e_end);
        if start_ok && end_ok {
            return BodyDragMode::Bridge {
                start: BridgeAnchor {
                    neighbor: s_id,
                    neighbor_end: s_end,
                    point: pipe.p1,
                },
                end: BridgeAnchor {
                    neighbor: e_id,
                    neighbor_end: e_end,
                    point: pipe.p2,
                },
            };
        }
    }

    let chain = collect_chain(network, pipe);
    if chain.len() > 1 {
        BodyDragMode::Chain(chain)
    } else {
        BodyDragMode::Free
    }
}

/// Other pipes' endpoints joined to the given end of `pipe`.
fn neighbors_at(network: &PipeNetwork, pipe: &Pipe, end: PipeEnd) -> Vec<(PipeId, PipeEnd)> {
    network
        .endpoints_at(pipe.endpoint(end), ENDPOINT_JOIN_TOLERANCE)
        .into_iter()
        .filter(|&(pid, _)| pid != pipe.id)
        .collect()
}

/// A bridge-side neighbor must be colinear with the dragged pipe and
/// connected to nothing else: its far endpoint is free.
fn bridge_neighbor_ok(
    network: &PipeNetwork,
    dragged: &Pipe,
    neighbor: PipeId,
    neighbor_end: PipeEnd,
) -> bool {
    let Some(n) = network.pipe(neighbor) else {
        return false;
    };
    if !dragged.is_colinear_with(n, CHAIN_PARALLEL_TOLERANCE_DEG) {
        return false;
    }
    let far = n.endpoint(neighbor_end.opposite());
    network.endpoint_count(far, ENDPOINT_JOIN_TOLERANCE) == 1
}

/// The maximal run of pipes colinear with `start` and transitively joined
/// endpoint-to-endpoint.
fn collect_chain(network: &PipeNetwork, start: &Pipe) -> Vec<PipeId> {
    let mut chain = vec![start.id];
    let mut queue = vec![start.id];
    while let Some(pid) = queue.pop() {
        let Some(pipe) = network.pipe(pid).cloned() else {
            continue;
        };
        for end in [PipeEnd::Start, PipeEnd::End] {
            for (nid, _) in network.endpoints_at(pipe.endpoint(end), ENDPOINT_JOIN_TOLERANCE) {
                if chain.contains(&nid) {
                    continue;
                }
                if let Some(n) = network.pipe(nid) {
                    if start.is_colinear_with(n, CHAIN_PARALLEL_TOLERANCE_DEG) {
                        chain.push(nid);
                        queue.push(nid);
                    }
                }
            }
        }
    }
    chain
}

/// Translate every pipe in `group` by `step`, carrying cross-connected
/// endpoints, riding fittings and attached valves. Endpoints of pipes
/// outside the group stretch toward the moved junctions and are validated
/// for collisions and minimum length first.
fn translate_group(network: &mut PipeNetwork, group: &[PipeId], step: DVec3) -> bool {
    if step.length_squared() < f64::EPSILON {
        return true;
    }

    // Every endpoint that travels: both ends of each group pipe plus any
    // foreign endpoint joined to one of them.
    let mut moving: Vec<(PipeId, PipeEnd, DVec3)> = Vec::new();
    for &pid in group {
        let Some(pipe) = network.pipe(pid) else {
            continue;
        };
        for end in [PipeEnd::Start, PipeEnd::End] {
            let pos = pipe.endpoint(end);
            for (jid, jend) in network.endpoints_at(pos, ENDPOINT_JOIN_TOLERANCE) {
                if !moving.iter().any(|&(p, e, _)| p == jid && e == jend) {
                    moving.push((jid, jend, pos));
                }
            }
            if !moving.iter().any(|&(p, e, _)| p == pid && e == end) {
                moving.push((pid, end, pos));
            }
        }
    }
    let in_moving =
        |pid: PipeId, end: PipeEnd| moving.iter().any(|&(p, e, _)| p == pid && e == end);
    let floor = group
        .first()
        .and_then(|&pid| network.pipe(pid))
        .map(|p| p.floor_id);

    // Collision of every destination against endpoints that stay put.
    // Pipes on other floors are not on the same level and never collide.
    for &(_, _, pos) in &moving {
        let dest = pos + step;
        for pipe in network.pipes() {
            if Some(pipe.floor_id) != floor {
                continue;
            }
            for end in [PipeEnd::Start, PipeEnd::End] {
                if in_moving(pipe.id, end) {
                    continue;
                }
                let other = pipe.endpoint(end);
                let tol = if network.endpoint_count(other, ENDPOINT_JOIN_TOLERANCE) >= 2 {
                    JUNCTION_COLLISION_TOLERANCE
                } else {
                    ENDPOINT_COLLISION_TOLERANCE
                };
                if points_coincide(dest, other, tol, tol) {
                    log::debug!("body drag rejected: collision with {}", pipe.id);
                    return false;
                }
            }
        }
    }

    // Pipes with exactly one moving endpoint stretch; check their new length.
    for pipe in network.pipes() {
        let s = in_moving(pipe.id, PipeEnd::Start);
        let e = in_moving(pipe.id, PipeEnd::End);
        if s == e {
            continue;
        }
        let (fixed, moved) = if s { (pipe.p2, pipe.p1) } else { (pipe.p1, pipe.p2) };
        let new_len = (moved + step - fixed).length();
        if new_len + geom::COINCIDENT_EPSILON < network.min_length(pipe.id) {
            log::debug!("body drag rejected: pipe {} below minimum length", pipe.id);
            return false;
        }
    }

    for &(pid, end, pos) in &moving {
        if let Some(p) = network.pipe_mut(pid) {
            p.set_endpoint(end, pos + step);
        }
    }

    // Valves: group pipes translate rigidly, stretched pipes recompute.
    for &pid in group {
        translate_valves_on(network, pid, step);
    }
    let stretched: Vec<(PipeId, PipeEnd)> = moving
        .iter()
        .map(|&(p, e, _)| (p, e))
        .filter(|&(p, _)| !group.contains(&p))
        .collect();
    for (pid, end) in stretched {
        super::endpoint_drag::reposition_valves(network, pid, end);
    }

    // Meters and devices whose inlet rides a moving endpoint.
    let mut riders: Vec<(FittingId, bool)> = Vec::new();
    for fitting in network.fittings() {
        match fitting {
            Fitting::Meter(m) => {
                if m.inlet.is_some_and(|c| in_moving(c.pipe, c.end)) {
                    riders.push((m.id, true));
                }
            }
            Fitting::Device(d) => {
                if d.inlet.is_some_and(|c| in_moving(c.pipe, c.end)) {
                    riders.push((d.id, false));
                }
            }
            _ => {}
        }
    }
    for (id, is_meter) in riders {
        let chimney = network
            .fitting(id)
            .and_then(Fitting::as_device)
            .and_then(|d| d.chimney);
        if let Some(f) = network.fitting_mut(id) {
            f.translate(step);
        }
        if is_meter {
            // The rigid outlet chain already moved if its pipe is in the
            // group; a meter hanging off a stretched endpoint keeps its
            // outlet pipe start pinned to the outlet point.
            let outlet = network.fitting(id).and_then(Fitting::as_meter).and_then(
                |m| m.outlet_pipe.map(|p| (p, m.outlet_point())),
            );
            if let Some((pid, point)) = outlet {
                if !group.contains(&pid) {
                    if let Some(p) = network.pipe_mut(pid) {
                        p.p1 = point;
                    }
                }
            }
        } else if let Some(cid) = chimney {
            if let Some(f) = network.fitting_mut(cid) {
                f.translate(step);
            }
        }
    }

    network.refresh_end_caps();
    true
}

/// Translate every valve attached to `pipe_id` by `step` (the pipe itself
/// moved rigidly, so `t` and anchors are unchanged).
fn translate_valves_on(network: &mut PipeNetwork, pipe_id: PipeId, step: DVec3) {
    for valve_id in network.valves_on_pipe(pipe_id) {
        if let Some(Fitting::Valve(v)) = network.fitting_mut(valve_id) {
            v.position += step;
        }
    }
}

/// Bridge-mode collision check: the dragged pipe's destinations must not
/// land on any endpoint other than its own or the fixed junction points.
fn bridge_destination_clear(
    network: &PipeNetwork,
    dragged: PipeId,
    start: &BridgeAnchor,
    end: &BridgeAnchor,
    dest_p1: DVec3,
    dest_p2: DVec3,
) -> bool {
    let Some(floor) = network.pipe(dragged).map(|p| p.floor_id) else {
        return false;
    };
    for pipe in network.pipes() {
        if pipe.id == dragged || pipe.floor_id != floor {
            continue;
        }
        for pend in [PipeEnd::Start, PipeEnd::End] {
            if (pipe.id, pend) == (start.neighbor, start.neighbor_end)
                || (pipe.id, pend) == (end.neighbor, end.neighbor_end)
            {
                continue;
            }
            let other = pipe.endpoint(pend);
            let tol = if network.endpoint_count(other, ENDPOINT_JOIN_TOLERANCE) >= 2 {
                JUNCTION_COLLISION_TOLERANCE
            } else {
                ENDPOINT_COLLISION_TOLERANCE
            };
            if points_coincide(dest_p1, other, tol, tol) || points_coincide(dest_p2, other, tol, tol)
            {
                return false;
            }
        }
    }
    true
}

/// Create the connector pipe between a fixed junction and the displaced end
/// of the dragged pipe, rewiring whichever parent/child relationship linked
/// the dragged pipe and the neighbor before the drag.
fn synthesize_bridge(network: &mut PipeNetwork, dragged: &Pipe, end: PipeEnd, anchor: &BridgeAnchor) {
    let moved = dragged.endpoint(end);

    let dragged_pointed_at_neighbor = dragged
        .connection(end)
        .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == anchor.neighbor);
    let neighbor_pointed_at_dragged = network
        .pipe(anchor.neighbor)
        .and_then(|n| n.connection(anchor.neighbor_end))
        .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == dragged.id);

    if dragged_pointed_at_neighbor {
        // Neighbor is upstream: junction → bridge → dragged.
        let mut bridge = Pipe::new(anchor.point, moved, dragged.category, dragged.floor_id);
        bridge.color_group = dragged.color_group;
        bridge.start_connection = Some(Connection::pipe(anchor.neighbor));
        let bridge_id = network.add_pipe(bridge);
        if let Some(p) = network.pipe_mut(dragged.id) {
            p.set_connection(end, Some(Connection::pipe(bridge_id)));
        }
    } else {
        // Dragged is upstream (or the link was purely geometric):
        // dragged → bridge → junction.
        let mut bridge = Pipe::new(moved, anchor.point, dragged.category, dragged.floor_id);
        bridge.color_group = dragged.color_group;
        bridge.start_connection = Some(Connection::pipe(dragged.id));
        let bridge_id = network.add_pipe(bridge);
        if neighbor_pointed_at_dragged {
            if let Some(n) = network.pipe_mut(anchor.neighbor) {
                n.set_connection(anchor.neighbor_end, Some(Connection::pipe(bridge_id)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::PipeCategory;

    fn p(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x, y, z)
    }

    fn pipe(a: DVec3, b: DVec3) -> Pipe {
        Pipe::new(a, b, PipeCategory::Branch, 0)
    }

    #[test]
    fn test_free_drag_suppresses_principal_axis() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, id, p(50.0, 0.0, 0.0)));
        assert!(matches!(
            state.body_drag.as_ref().unwrap().mode,
            BodyDragMode::Free
        ));
        // Target moves 30 along X (principal, suppressed) and 20 along Y.
        assert!(update_body_drag(&mut net, &mut state, p(80.0, 20.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        let moved = net.pipe(id).unwrap();
        assert_eq!(moved.p1, p(0.0, 20.0, 0.0));
        assert_eq!(moved.p2, p(100.0, 20.0, 0.0));
    }

    #[test]
    fn test_free_drag_stretches_elbow_neighbor() {
        let mut net = PipeNetwork::new();
        let a = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        // Perpendicular neighbor joined at (100, 0).
        let b = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(100.0, 100.0, 0.0)));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, a, p(50.0, 0.0, 0.0)));
        assert!(update_body_drag(&mut net, &mut state, p(50.0, -30.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        assert_eq!(net.pipe(a).unwrap().p1, p(0.0, -30.0, 0.0));
        // The neighbor's shared endpoint followed; its far end stayed.
        assert_eq!(net.pipe(b).unwrap().p1, p(100.0, -30.0, 0.0));
        assert_eq!(net.pipe(b).unwrap().p2, p(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_three_pipe_colinear_run_with_free_neighbors_is_bridge() {
        let mut net = PipeNetwork::new();
        let left = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mid = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0)));
        let right = net.add_pipe(pipe(p(200.0, 0.0, 0.0), p(300.0, 0.0, 0.0)));
        net.pipe_mut(mid).unwrap().start_connection = Some(Connection::pipe(left));
        net.pipe_mut(right).unwrap().start_connection = Some(Connection::pipe(mid));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, mid, p(150.0, 0.0, 0.0)));
        assert!(matches!(
            state.body_drag.as_ref().unwrap().mode,
            BodyDragMode::Bridge { .. }
        ));

        assert!(update_body_drag(&mut net, &mut state, p(150.0, 20.0, 0.0)));
        // Ghost previews span junction to displaced endpoint.
        assert_eq!(state.ghost_bridges.len(), 2);
        assert_eq!(state.ghost_bridges[0].p1, p(100.0, 0.0, 0.0));
        assert_eq!(state.ghost_bridges[0].p2, p(100.0, 20.0, 0.0));

        finish_body_drag(&mut net, &mut state);
        assert!(state.ghost_bridges.is_empty());

        // Two bridge pipes were synthesized; neighbors are untouched.
        assert_eq!(net.pipes().count(), 5);
        assert_eq!(net.pipe(left).unwrap().p2, p(100.0, 0.0, 0.0));
        assert_eq!(net.pipe(right).unwrap().p1, p(200.0, 0.0, 0.0));
        assert_eq!(net.pipe(mid).unwrap().p1, p(100.0, 20.0, 0.0));

        // Parenthood runs junction → bridge → dragged on the start side.
        let mid_pipe = net.pipe(mid).unwrap();
        let start_conn = mid_pipe.start_connection.unwrap();
        assert_eq!(start_conn.kind, ConnectionKind::Pipe);
        let bridge = net.pipe(start_conn.target).unwrap();
        assert_eq!(bridge.p1, p(100.0, 0.0, 0.0));
        assert_eq!(bridge.p2, p(100.0, 20.0, 0.0));
        assert_eq!(
            bridge.start_connection.unwrap().target,
            left
        );
        assert_eq!(bridge.category, mid_pipe.category);
        assert_eq!(bridge.color_group, mid_pipe.color_group);
    }

    #[test]
    fn test_anchored_neighbors_form_chain() {
        let mut net = PipeNetwork::new();
        let left = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mid = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0)));
        let right = net.add_pipe(pipe(p(200.0, 0.0, 0.0), p(300.0, 0.0, 0.0)));
        // Anchor the left neighbor's far end with a riser.
        let riser = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(0.0, 0.0, 50.0)));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, mid, p(150.0, 0.0, 0.0)));
        let BodyDragMode::Chain(chain) = &state.body_drag.as_ref().unwrap().mode else {
            panic!("expected chain mode");
        };
        assert_eq!(chain.len(), 3);

        assert!(update_body_drag(&mut net, &mut state, p(150.0, 25.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        // The whole run moved; the riser stretched to follow.
        assert_eq!(net.pipe(left).unwrap().p1, p(0.0, 25.0, 0.0));
        assert_eq!(net.pipe(mid).unwrap().p1, p(100.0, 25.0, 0.0));
        assert_eq!(net.pipe(right).unwrap().p2, p(300.0, 25.0, 0.0));
        assert_eq!(net.pipe(riser).unwrap().p1, p(0.0, 25.0, 0.0));
        assert_eq!(net.pipe(riser).unwrap().p2, p(0.0, 0.0, 50.0));
        // No bridges in chain mode.
        assert_eq!(net.pipes().count(), 4);
    }

    #[test]
    fn test_bridge_finish_without_movement_adds_nothing() {
        let mut net = PipeNetwork::new();
        net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mid = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0)));
        net.add_pipe(pipe(p(200.0, 0.0, 0.0), p(300.0, 0.0, 0.0)));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, mid, p(150.0, 0.0, 0.0)));
        finish_body_drag(&mut net, &mut state);
        assert_eq!(net.pipes().count(), 3);
    }

    #[test]
    fn test_bridge_release_below_connector_minimum_snaps_back() {
        let mut net = PipeNetwork::new();
        net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mid = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0)));
        net.add_pipe(pipe(p(200.0, 0.0, 0.0), p(300.0, 0.0, 0.0)));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, mid, p(150.0, 0.0, 0.0)));
        // A 3-unit gap cannot hold a legal connector (branch minimum 10).
        assert!(update_body_drag(&mut net, &mut state, p(150.0, 3.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        assert_eq!(net.pipes().count(), 3);
        assert_eq!(net.pipe(mid).unwrap().p1, p(100.0, 0.0, 0.0));
        assert_eq!(net.pipe(mid).unwrap().p2, p(200.0, 0.0, 0.0));
    }

    #[test]
    fn test_bridge_snap_back_carries_valves() {
        let mut net = PipeNetwork::new();
        net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mid = net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0)));
        net.add_pipe(pipe(p(200.0, 0.0, 0.0), p(300.0, 0.0, 0.0)));
        let mut valve = crate::network::Valve::new(p(150.0, 0.0, 0.0), 0);
        valve.attached_pipe = Some(mid);
        valve.t = 0.5;
        let valve = net.add_fitting(Fitting::Valve(valve));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, mid, p(150.0, 0.0, 0.0)));
        assert!(update_body_drag(&mut net, &mut state, p(150.0, 4.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        let v = net.fitting(valve).unwrap().as_valve().unwrap();
        assert_eq!(v.position, p(150.0, 0.0, 0.0));
    }

    #[test]
    fn test_drag_ignores_endpoints_on_other_floors() {
        let mut net = PipeNetwork::new();
        let a = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        // A pipe directly in the landing zone, one floor up.
        net.add_pipe(Pipe::new(
            p(0.0, 20.0, 0.0),
            p(100.0, 20.0, 0.0),
            PipeCategory::Branch,
            1,
        ));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, a, p(50.0, 0.0, 0.0)));
        assert!(update_body_drag(&mut net, &mut state, p(50.0, 20.0, 0.0)));
        finish_body_drag(&mut net, &mut state);
        assert_eq!(net.pipe(a).unwrap().p1, p(0.0, 20.0, 0.0));
    }

    #[test]
    fn test_chain_drag_rejected_when_cross_pipe_would_collapse() {
        let mut net = PipeNetwork::new();
        let a = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        // Short stub hanging off the moving endpoint; dragging 15 toward its
        // far end would shrink it below the minimum length.
        let stub = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(0.0, 12.0, 0.0)));

        let mut state = InteractionState::new();
        assert!(begin_body_drag(&net, &mut state, a, p(50.0, 0.0, 0.0)));
        assert!(!update_body_drag(&mut net, &mut state, p(50.0, 11.0, 0.0)));
        finish_body_drag(&mut net, &mut state);

        assert_eq!(net.pipe(a).unwrap().p1, p(0.0, 0.0, 0.0));
        assert_eq!(net.pipe(stub).unwrap().p1, p(0.0, 0.0, 0.0));
    }
}
