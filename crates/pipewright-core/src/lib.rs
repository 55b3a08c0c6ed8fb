//! PipeWright Core Library
//!
//! Platform-agnostic topology model and interaction engine for an
//! interactive piping-network editor: the pipe/fitting graph, snapping,
//! drag/transform constraints, splitting and placement, and snapshot
//! undo/redo. Rendering and UI live in the host.

pub mod draw;
pub mod geom;
pub mod history;
pub mod interact;
pub mod modes;
pub mod network;
pub mod place;
pub mod snap;
pub mod walls;

pub use draw::{
    DrawSession, DrawSource, abort_draw, confirm_point, finish_draw, preview_point, start_draw,
};
pub use history::{History, NetworkSnapshot};
pub use interact::{
    BodyDragMode, InteractionState, begin_body_drag, begin_endpoint_drag, finish_body_drag,
    finish_endpoint_drag, is_protected_point, rotate_fitting, rotate_meter_fixed_pivot,
    slide_valve, update_body_drag, update_endpoint_drag,
};
pub use modes::{EditorMode, ModeDispatcher, NullDispatcher};
pub use network::{
    ColorGroup, Connection, ConnectionKind, Fitting, FittingId, Hierarchy, NetworkError,
    NetworkResult, Pipe, PipeCategory, PipeEnd, PipeId, PipeNetwork,
};
pub use place::{
    attach_chimney, attach_device, attach_meter, place_device_mid_span, place_meter_mid_span,
    split_pipe,
};
pub use snap::{SnapCandidate, SnapKind, snap_point};
pub use walls::{ServiceLine, Wall};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Fitting, ServiceBox};
    use glam::DVec3;

    fn p(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x, y, z)
    }

    /// No two pipes may carry the same upstream edge: identical endpoints
    /// wired to the same parent is duplicate wiring.
    fn assert_unique_upstream_wiring(net: &PipeNetwork) {
        let mut seen = std::collections::HashSet::new();
        let quantize =
            |v: DVec3| ((v.x * 10.0) as i64, (v.y * 10.0) as i64, (v.z * 10.0) as i64);
        for pipe in net.pipes() {
            if let Some(conn) = pipe.start_connection {
                let key = (conn.kind as u8, conn.target, quantize(pipe.p1), quantize(pipe.p2));
                assert!(
                    seen.insert(key),
                    "duplicate upstream wiring between {} and {}",
                    pipe.id,
                    conn.target
                );
            }
        }
    }

    /// Service box → trunk → split → meter → post-meter branch, then undo
    /// all the way back.
    #[test]
    fn test_full_editing_workflow() {
        let mut net = PipeNetwork::new();
        let mut state = InteractionState::new();
        let mut dispatcher = modes::RecordingDispatcher::default();
        let mut history = History::new();

        let sbox = ServiceBox::new(p(0.0, 0.0, 0.0), 0);
        let outlet = sbox.outlet_point();
        let sbox_id = net.add_fitting(Fitting::ServiceBox(sbox));

        // Draw the trunk.
        history.push_undo(&net, &state);
        assert!(start_draw(
            &net,
            &mut state,
            &mut dispatcher,
            outlet,
            Some(DrawSource::ServiceBox(sbox_id)),
            PipeCategory::Main,
            0,
            None,
        ));
        let trunk_end = outlet + DVec3::new(100.0, 0.0, 0.0);
        let trunk = confirm_point(&mut net, &mut state, trunk_end).unwrap();
        finish_draw(&mut state, &mut dispatcher);
        assert_eq!(
            dispatcher.requests,
            vec![EditorMode::DrawPipe, EditorMode::Select]
        );
        assert_eq!(net.pipe(trunk).unwrap().color_group, ColorGroup::PreMeter);

        // Split the trunk mid-way.
        history.push_undo(&net, &state);
        let (_, second) = split_pipe(&mut net, trunk, outlet + DVec3::new(40.0, 0.0, 0.0))
            .unwrap()
            .unwrap();

        // Attach a meter at the trunk's free end.
        history.push_undo(&net, &state);
        let meter = attach_meter(&mut net, trunk_end).unwrap();
        assert_eq!(net.valves_on_pipe(second).len(), 1);

        // Branch off the meter outlet with post-meter lineage.
        let meter_outlet = net
            .fitting(meter)
            .unwrap()
            .as_meter()
            .unwrap()
            .outlet_point();
        history.push_undo(&net, &state);
        assert!(start_draw(
            &net,
            &mut state,
            &mut dispatcher,
            meter_outlet,
            Some(DrawSource::Meter(meter)),
            PipeCategory::Branch,
            0,
            None,
        ));
        let branch =
            confirm_point(&mut net, &mut state, meter_outlet + DVec3::new(80.0, 0.0, 0.0))
                .unwrap();
        finish_draw(&mut state, &mut dispatcher);

        assert_eq!(net.pipe(branch).unwrap().color_group, ColorGroup::PostMeter);
        assert!(net.has_ancestor_meter(branch));
        assert!(!net.has_ancestor_meter(second));
        assert_unique_upstream_wiring(&net);

        // Hierarchy reaches every pipe from the single root.
        let hierarchy = net.hierarchy();
        assert_eq!(hierarchy.len(), net.pipes().count());

        // Unwind the whole session.
        while history.undo(&mut net, &mut state) {}
        assert_eq!(net.pipes().count(), 0);
        assert!(state.is_idle());
    }

    /// Branch fan-out at one junction is legal; the shared parent must not
    /// produce duplicate upstream edges.
    #[test]
    fn test_branch_fan_out_keeps_wiring_unique() {
        let mut net = PipeNetwork::new();
        let mut state = InteractionState::new();
        let mut dispatcher = NullDispatcher;
        let trunk = net.add_pipe(Pipe::new(
            p(0.0, 0.0, 0.0),
            p(100.0, 0.0, 0.0),
            PipeCategory::Main,
            0,
        ));

        // Two branches drawn from the trunk's end in opposite directions.
        for far in [p(100.0, 80.0, 0.0), p(100.0, -80.0, 0.0)] {
            assert!(start_draw(
                &net,
                &mut state,
                &mut dispatcher,
                p(100.0, 0.0, 0.0),
                None,
                PipeCategory::Branch,
                0,
                None,
            ));
            confirm_point(&mut net, &mut state, far).unwrap();
            finish_draw(&mut state, &mut dispatcher);
        }

        assert_unique_upstream_wiring(&net);
        let children = net
            .pipes()
            .filter(|pipe| {
                pipe.start_connection
                    .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == trunk)
            })
            .count();
        assert_eq!(children, 2);
    }

    /// Splitting conserves fittings: the valve lands on the closer half.
    #[test]
    fn test_split_keeps_valve_on_closer_half() {
        let mut net = PipeNetwork::new();
        let pipe = net.add_pipe(Pipe::new(
            p(0.0, 0.0, 0.0),
            p(100.0, 0.0, 0.0),
            PipeCategory::Branch,
            0,
        ));
        let mut valve = network::Valve::new(p(80.0, 0.0, 0.0), 0);
        valve.attached_pipe = Some(pipe);
        valve.t = 0.8;
        let valve = net.add_fitting(Fitting::Valve(valve));

        let (first, second) = split_pipe(&mut net, pipe, p(40.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert!(net.valves_on_pipe(first).is_empty());
        assert_eq!(net.valves_on_pipe(second), vec![valve]);
        let v = net.fitting(valve).unwrap().as_valve().unwrap();
        // 80 along the original run is 40 into the 60-unit second half.
        assert!((v.t - 40.0 / 60.0).abs() < 1e-9);
        assert_eq!(v.position, p(80.0, 0.0, 0.0));
    }
}
