//! Endpoint drag: moving one end of a pipe with snapping, validation and
//! propagation to everything connected at that point.

use super::protect::{ProtectedPointQuery, is_protected_point};
use super::{
    ALIGNMENT_SNAP_TOLERANCE, ENDPOINT_COLLISION_TOLERANCE, InteractionState,
    JUNCTION_COLLISION_TOLERANCE, WALL_SNAP_CAPTURE,
};
use crate::geom::{self, Axis, points_coincide, project_onto_segment};
use crate::network::{
    ENDPOINT_JOIN_TOLERANCE, Fitting, FittingId, PipeEnd, PipeId, PipeNetwork,
};
use crate::walls::{WALL_CLEARANCE, Wall};
use glam::DVec3;

/// Descriptor of an active endpoint drag.
#[derive(Debug, Clone, Copy)]
pub struct EndpointDrag {
    pub pipe: PipeId,
    pub end: PipeEnd,
    /// Endpoint position when the drag started.
    pub origin: DVec3,
}

/// Start dragging an endpoint. Fails when another interaction is active or
/// the pipe does not exist.
pub fn begin_endpoint_drag(
    network: &PipeNetwork,
    state: &mut InteractionState,
    pipe: PipeId,
    end: PipeEnd,
) -> bool {
    if state.is_dragging {
        return false;
    }
    let Some(p) = network.pipe(pipe) else {
        log::warn!("endpoint drag on missing pipe {pipe}");
        return false;
    };
    state.clear_drag();
    state.endpoint_drag = Some(EndpointDrag {
        pipe,
        end,
        origin: p.endpoint(end),
    });
    state.is_dragging = true;
    true
}

/// Move the dragged endpoint toward `target`. The target is adjusted by wall
/// and alignment snapping, then validated; a rejected move returns false and
/// leaves the network untouched.
pub fn update_endpoint_drag(
    network: &mut PipeNetwork,
    state: &mut InteractionState,
    walls: &[Wall],
    target: DVec3,
) -> bool {
    let Some(drag) = state.endpoint_drag else {
        return false;
    };
    let Some(pipe) = network.pipe(drag.pipe) else {
        // The pipe vanished mid-drag (e.g. snapshot restore); degrade.
        state.clear_drag();
        return false;
    };
    let floor_id = pipe.floor_id;
    let current = pipe.endpoint(drag.end);

    let dest = if state.axis_mode {
        let axis = state
            .locked_axis
            .unwrap_or_else(|| Axis::dominant(target - drag.origin));
        axis.constrain(drag.origin, target)
    } else {
        let snapped = snap_to_wall_surfaces(target, walls, floor_id);
        align_with_neighbors(network, drag, current, snapped)
    };

    if !validate_endpoint_move(network, drag, current, dest) {
        return false;
    }
    if (dest - current).length_squared() < f64::EPSILON {
        return true;
    }

    apply_endpoint_move(network, drag.pipe, drag.end, current, dest);
    true
}

/// End the drag, clearing interaction state. The last applied position is
/// kept; nothing further is committed.
pub fn finish_endpoint_drag(state: &mut InteractionState) {
    state.clear_drag();
}

/// Adjust X and Y independently toward nearby wall service surfaces. Each
/// coordinate moves only when within the capture radius, and walls whose
/// thickness band already contains the point are left alone.
fn snap_to_wall_surfaces(point: DVec3, walls: &[Wall], floor_id: u32) -> DVec3 {
    let plan = geom::plan(point);
    let mut snapped = plan;
    for wall in walls.iter().filter(|w| w.floor_id == floor_id) {
        if wall.thickness_band_contains(plan) {
            continue;
        }
        for line in wall.service_lines(WALL_CLEARANCE) {
            let foot = project_onto_segment(plan, line.p1, line.p2).point;
            let dx = foot.x - plan.x;
            let dy = foot.y - plan.y;
            // Only pure per-axis adjustments: the projection must move the
            // point along a single axis.
            if dy.abs() < geom::COINCIDENT_EPSILON
                && dx.abs() > geom::COINCIDENT_EPSILON
                && dx.abs() <= WALL_SNAP_CAPTURE
            {
                snapped.x = foot.x;
            }
            if dx.abs() < geom::COINCIDENT_EPSILON
                && dy.abs() > geom::COINCIDENT_EPSILON
                && dy.abs() <= WALL_SNAP_CAPTURE
            {
                snapped.y = foot.y;
            }
        }
    }
    geom::lift(snapped, point.z)
}

/// Snap X/Y to the coordinates of the pipe's own far endpoint or of the free
/// ends of pipes connected at the dragged point, producing orthogonal
/// alignment instead of coincident merging.
fn align_with_neighbors(
    network: &PipeNetwork,
    drag: EndpointDrag,
    current: DVec3,
    dest: DVec3,
) -> DVec3 {
    let mut refs: Vec<DVec3> = Vec::new();
    if let Some(pipe) = network.pipe(drag.pipe) {
        refs.push(pipe.endpoint(drag.end.opposite()));
    }
    for (pid, end) in network.endpoints_at(current, ENDPOINT_JOIN_TOLERANCE) {
        if pid == drag.pipe {
            continue;
        }
        if let Some(pipe) = network.pipe(pid) {
            refs.push(pipe.endpoint(end.opposite()));
        }
    }

    let mut aligned = dest;
    let mut best_dx = ALIGNMENT_SNAP_TOLERANCE;
    let mut best_dy = ALIGNMENT_SNAP_TOLERANCE;
    for r in refs {
        let dx = (r.x - dest.x).abs();
        if dx > geom::COINCIDENT_EPSILON && dx < best_dx {
            best_dx = dx;
            aligned.x = r.x;
        }
        let dy = (r.y - dest.y).abs();
        if dy > geom::COINCIDENT_EPSILON && dy < best_dy {
            best_dy = dy;
            aligned.y = r.y;
        }
    }
    aligned
}

/// Dry-run validation of an endpoint move: protected points, foreign
/// endpoint collisions and minimum lengths of every pipe that would move.
fn validate_endpoint_move(
    network: &PipeNetwork,
    drag: EndpointDrag,
    current: DVec3,
    dest: DVec3,
) -> bool {
    let query = ProtectedPointQuery {
        exclude_pipe: Some((drag.pipe, drag.end)),
        exclude_origin: Some(current),
        // The elbow-aware collision check below is finer grained.
        suppress_free_endpoints: true,
    };
    if is_protected_point(network, dest, &query) {
        log::debug!("endpoint drag rejected: protected point");
        return false;
    }

    let moving = moving_endpoints(network, drag.pipe, drag.end, current);
    let floor = network.pipe(drag.pipe).map(|p| p.floor_id);

    // Elbow-aware collision against endpoints that stay put. Pipes on
    // other floors are not on the same level and never collide.
    for pipe in network.pipes() {
        if Some(pipe.floor_id) != floor {
            continue;
        }
        for end in [PipeEnd::Start, PipeEnd::End] {
            if moving.contains(&(pipe.id, end)) {
                continue;
            }
            let other = pipe.endpoint(end);
            let tol = if network.endpoint_count(other, ENDPOINT_JOIN_TOLERANCE) >= 2 {
                JUNCTION_COLLISION_TOLERANCE
            } else {
                ENDPOINT_COLLISION_TOLERANCE
            };
            if points_coincide(dest, other, tol, tol) {
                log::debug!("endpoint drag rejected: collision with {}", pipe.id);
                return false;
            }
        }
    }

    // Minimum length of every pipe whose endpoint travels with the drag.
    for &(pid, end) in &moving {
        let Some(pipe) = network.pipe(pid) else {
            continue;
        };
        let new_len = (dest - pipe.endpoint(end.opposite())).length();
        if new_len + geom::COINCIDENT_EPSILON < network.min_length(pid) {
            log::debug!("endpoint drag rejected: pipe {pid} below minimum length");
            return false;
        }
    }
    true
}

/// The set of pipe endpoints that travel with a drag of `(pipe, end)` whose
/// pre-move position is `origin`: the dragged endpoint itself plus every
/// endpoint coincident with the origin.
fn moving_endpoints(
    network: &PipeNetwork,
    pipe: PipeId,
    end: PipeEnd,
    origin: DVec3,
) -> Vec<(PipeId, PipeEnd)> {
    let mut moving = network.endpoints_at(origin, ENDPOINT_JOIN_TOLERANCE);
    if !moving.contains(&(pipe, end)) {
        moving.push((pipe, end));
    }
    moving
}

/// Apply a validated endpoint move: reposition the dragged endpoint, every
/// coincident endpoint, every valve on an affected pipe, and every meter or
/// device whose connections terminate at the point.
pub(crate) fn apply_endpoint_move(
    network: &mut PipeNetwork,
    pipe: PipeId,
    end: PipeEnd,
    origin: DVec3,
    dest: DVec3,
) {
    let delta = dest - origin;
    let moving = moving_endpoints(network, pipe, end, origin);

    for &(pid, pend) in &moving {
        if let Some(p) = network.pipe_mut(pid) {
            p.set_endpoint(pend, dest);
        }
    }

    // Meters and devices whose inlet sits on a moved endpoint ride along;
    // a meter also drags the rigid chain hanging off its outlet.
    let mut moved_meters: Vec<FittingId> = Vec::new();
    let mut moved_devices: Vec<FittingId> = Vec::new();
    for fitting in network.fittings() {
        match fitting {
            Fitting::Meter(m) => {
                if m.inlet.is_some_and(|c| moving.contains(&(c.pipe, c.end))) {
                    moved_meters.push(m.id);
                }
            }
            Fitting::Device(d) => {
                if d.inlet.is_some_and(|c| moving.contains(&(c.pipe, c.end))) {
                    moved_devices.push(d.id);
                }
            }
            _ => {}
        }
    }
    for id in moved_meters {
        let old_outlet = match network.fitting(id).and_then(Fitting::as_meter) {
            Some(m) => m.outlet_point(),
            None => continue,
        };
        if let Some(f) = network.fitting_mut(id) {
            f.translate(delta);
        }
        // Rigid outlet: everything attached at the old outlet point shifts
        // to the new one.
        let new_outlet = old_outlet + delta;
        let attached = network.endpoints_at(old_outlet, ENDPOINT_JOIN_TOLERANCE);
        for (pid, pend) in attached {
            if let Some(p) = network.pipe_mut(pid) {
                p.set_endpoint(pend, new_outlet);
            }
        }
    }
    for id in moved_devices {
        let chimney = network
            .fitting(id)
            .and_then(Fitting::as_device)
            .and_then(|d| d.chimney);
        if let Some(f) = network.fitting_mut(id) {
            f.translate(delta);
        }
        if let Some(cid) = chimney {
            if let Some(f) = network.fitting_mut(cid) {
                f.translate(delta);
            }
        }
    }

    for &(pid, pend) in &moving {
        reposition_valves(network, pid, pend);
    }
    network.refresh_end_caps();
}

/// Recompute valve positions on a pipe after the given endpoint moved.
/// Anchored valves keep their fixed distance from the anchored end; free
/// valves keep their distance from the endpoint that did not move.
pub(crate) fn reposition_valves(network: &mut PipeNetwork, pipe_id: PipeId, moved_end: PipeEnd) {
    let Some(pipe) = network.pipe(pipe_id).cloned() else {
        return;
    };
    for valve_id in network.valves_on_pipe(pipe_id) {
        let Some(valve) = network.fitting(valve_id).and_then(Fitting::as_valve) else {
            continue;
        };
        let (t, position) = match valve.anchor {
            Some(anchor) => {
                let t = pipe.t_at_distance(anchor.from_end, anchor.distance);
                (t, pipe.point_at(t))
            }
            None => {
                let far = moved_end.opposite();
                let distance = (valve.position - pipe.endpoint(far)).length();
                let t = pipe.t_at_distance(far, distance);
                (t, pipe.point_at(t))
            }
        };
        if let Some(Fitting::Valve(v)) = network.fitting_mut(valve_id) {
            v.t = t;
            v.position = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        Connection, FixedAnchor, FlexConnection, Meter, Pipe, PipeCategory, Valve,
    };
    use kurbo::Point;

    fn p(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x, y, z)
    }

    fn pipe(a: DVec3, b: DVec3) -> Pipe {
        Pipe::new(a, b, PipeCategory::Branch, 0)
    }

    fn drag_to(
        net: &mut PipeNetwork,
        state: &mut InteractionState,
        id: PipeId,
        end: PipeEnd,
        target: DVec3,
    ) -> bool {
        assert!(begin_endpoint_drag(net, state, id, end));
        let ok = update_endpoint_drag(net, state, &[], target);
        finish_endpoint_drag(state);
        ok
    }

    #[test]
    fn test_simple_endpoint_move() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        assert!(drag_to(&mut net, &mut state, id, PipeEnd::End, p(100.0, 50.0, 0.0)));
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 50.0, 0.0));
        assert!(state.is_idle());
    }

    #[test]
    fn test_move_propagates_to_connected_pipes() {
        let mut net = PipeNetwork::new();
        let a = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut b = pipe(p(100.0, 0.0, 0.0), p(100.0, 100.0, 0.0));
        b.start_connection = Some(Connection::pipe(a));
        let b = net.add_pipe(b);

        let mut state = InteractionState::new();
        assert!(drag_to(&mut net, &mut state, a, PipeEnd::End, p(120.0, 20.0, 0.0)));
        assert_eq!(net.pipe(a).unwrap().p2, p(120.0, 20.0, 0.0));
        assert_eq!(net.pipe(b).unwrap().p1, p(120.0, 20.0, 0.0));
        // The far end of the neighbor is untouched.
        assert_eq!(net.pipe(b).unwrap().p2, p(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_rejects_below_minimum_length() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        // Branch margin 5.0 on both ends: anything under 10 is illegal.
        assert!(!drag_to(&mut net, &mut state, id, PipeEnd::End, p(4.0, 0.0, 0.0)));
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_rejects_drop_onto_elbow() {
        let mut net = PipeNetwork::new();
        // Elbow of two pipes at (100, 0).
        net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        net.add_pipe(pipe(p(100.0, 0.0, 0.0), p(100.0, 100.0, 0.0)));
        let loose = net.add_pipe(pipe(p(0.0, 50.0, 0.0), p(60.0, 50.0, 0.0)));

        let mut state = InteractionState::new();
        // Within 8 units of the junction: rejected.
        assert!(!drag_to(
            &mut net,
            &mut state,
            loose,
            PipeEnd::End,
            p(95.0, 4.0, 0.0)
        ));
        assert_eq!(net.pipe(loose).unwrap().p2, p(60.0, 50.0, 0.0));
    }

    #[test]
    fn test_collision_scoped_to_own_floor() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        // An endpoint exactly at the drop target, one floor up.
        net.add_pipe(Pipe::new(
            p(100.0, 50.0, 0.0),
            p(200.0, 50.0, 0.0),
            PipeCategory::Branch,
            1,
        ));

        let mut state = InteractionState::new();
        assert!(drag_to(&mut net, &mut state, id, PipeEnd::End, p(100.0, 50.0, 0.0)));
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 50.0, 0.0));
    }

    #[test]
    fn test_valve_keeps_distance_from_far_end() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut valve = Valve::new(p(80.0, 0.0, 0.0), 0);
        valve.attached_pipe = Some(id);
        valve.t = 0.8;
        let valve = net.add_fitting(Fitting::Valve(valve));

        let mut state = InteractionState::new();
        // Stretch the pipe from 100 to 200 units by dragging the end.
        assert!(drag_to(&mut net, &mut state, id, PipeEnd::End, p(200.0, 0.0, 0.0)));

        let v = net.fitting(valve).unwrap().as_valve().unwrap();
        // 80 units from the untouched start endpoint.
        assert!((v.position.x - 80.0).abs() < 1e-9);
        assert!((v.t - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_anchored_valve_keeps_distance_from_anchor_end() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut valve = Valve::new(p(94.0, 0.0, 0.0), 0);
        valve.attached_pipe = Some(id);
        valve.t = 0.94;
        valve.anchor = Some(FixedAnchor {
            from_end: PipeEnd::End,
            distance: 6.0,
        });
        let valve = net.add_fitting(Fitting::Valve(valve));

        let mut state = InteractionState::new();
        assert!(drag_to(&mut net, &mut state, id, PipeEnd::End, p(160.0, 0.0, 0.0)));

        let v = net.fitting(valve).unwrap().as_valve().unwrap();
        assert!((v.position.x - 154.0).abs() < 1e-9);
    }

    #[test]
    fn test_meter_rides_with_inlet_and_outlet_chain_follows() {
        let mut net = PipeNetwork::new();
        let feed = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(80.0, 0.0, 0.0)));
        let mut meter = Meter::new(p(90.0, 0.0, 0.0), 0);
        meter.inlet = Some(FlexConnection {
            pipe: feed,
            end: PipeEnd::End,
        });
        let outlet_pipe = pipe(p(100.0, 0.0, 0.0), p(200.0, 0.0, 0.0));
        let outlet_id = outlet_pipe.id;
        meter.outlet_pipe = Some(outlet_id);
        let meter_id = meter.id;
        net.add_fitting(Fitting::Meter(meter));
        let mut outlet_pipe = outlet_pipe;
        outlet_pipe.start_connection = Some(Connection::meter(meter_id));
        net.add_pipe(outlet_pipe);

        let mut state = InteractionState::new();
        assert!(drag_to(
            &mut net,
            &mut state,
            feed,
            PipeEnd::End,
            p(80.0, 30.0, 0.0)
        ));

        let meter = net.fitting(meter_id).unwrap().as_meter().unwrap();
        assert_eq!(meter.position, p(90.0, 30.0, 0.0));
        // Rigid outlet chain followed the meter.
        assert_eq!(net.pipe(outlet_id).unwrap().p1, p(100.0, 30.0, 0.0));
        assert_eq!(net.pipe(outlet_id).unwrap().p2, p(200.0, 0.0, 0.0));
    }

    #[test]
    fn test_axis_mode_constrains_to_dominant_axis() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        state.axis_mode = true;
        assert!(begin_endpoint_drag(&net, &mut state, id, PipeEnd::End));
        // Movement is mostly along Y; X and Z components are discarded.
        assert!(update_endpoint_drag(
            &mut net,
            &mut state,
            &[],
            p(104.0, 60.0, 2.0)
        ));
        finish_endpoint_drag(&mut state);
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 60.0, 0.0));
    }

    #[test]
    fn test_explicit_axis_lock_wins() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        state.axis_mode = true;
        assert!(begin_endpoint_drag(&net, &mut state, id, PipeEnd::End));
        state.locked_axis = Some(Axis::Z);
        assert!(update_endpoint_drag(
            &mut net,
            &mut state,
            &[],
            p(104.0, 60.0, 20.0)
        ));
        finish_endpoint_drag(&mut state);
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 0.0, 20.0));
    }

    #[test]
    fn test_wall_surface_snap_on_x() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 50.0, 0.0), p(100.0, 50.0, 0.0)));
        // Vertical wall at x = 200, thickness 10: service surfaces at 190/210.
        let walls = vec![Wall::new(
            Point::new(200.0, 0.0),
            Point::new(200.0, 100.0),
            10.0,
            0,
        )];
        let mut state = InteractionState::new();
        assert!(begin_endpoint_drag(&net, &mut state, id, PipeEnd::End));
        assert!(update_endpoint_drag(
            &mut net,
            &mut state,
            &walls,
            p(185.0, 50.0, 0.0)
        ));
        finish_endpoint_drag(&mut state);
        assert_eq!(net.pipe(id).unwrap().p2, p(190.0, 50.0, 0.0));
    }

    #[test]
    fn test_alignment_snap_to_own_far_endpoint() {
        let mut net = PipeNetwork::new();
        let id = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let mut state = InteractionState::new();
        // Dragging the end near the start's Y produces orthogonal alignment.
        assert!(drag_to(&mut net, &mut state, id, PipeEnd::End, p(100.0, 4.0, 0.0)));
        assert_eq!(net.pipe(id).unwrap().p2, p(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_second_interaction_blocked_while_dragging() {
        let mut net = PipeNetwork::new();
        let a = net.add_pipe(pipe(p(0.0, 0.0, 0.0), p(100.0, 0.0, 0.0)));
        let b = net.add_pipe(pipe(p(0.0, 50.0, 0.0), p(100.0, 50.0, 0.0)));
        let mut state = InteractionState::new();
        assert!(begin_endpoint_drag(&net, &mut state, a, PipeEnd::End));
        assert!(!begin_endpoint_drag(&net, &mut state, b, PipeEnd::End));
        finish_endpoint_drag(&mut state);
    }
}
