//! Draw sessions: appending pipe segments from a source (service box,
//! meter outlet, pipe endpoint or open space) one confirmed point at a time.

use crate::geom;
use crate::interact::{InteractionState, ProtectedPointQuery, is_protected_point};
use crate::modes::{EditorMode, ModeDispatcher};
use crate::network::{
    ColorGroup, Connection, Fitting, FittingId, Pipe, PipeCategory, PipeId, PipeNetwork,
};
use crate::snap::snap_point;
use crate::walls::Wall;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// What the next drawn segment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawSource {
    Pipe(PipeId),
    Meter(FittingId),
    ServiceBox(FittingId),
}

impl DrawSource {
    fn connection(self) -> Connection {
        match self {
            DrawSource::Pipe(id) => Connection::pipe(id),
            DrawSource::Meter(id) => Connection::meter(id),
            DrawSource::ServiceBox(id) => Connection::service_box(id),
        }
    }
}

/// In-progress draw state. Serialized with history snapshots so a saved
/// document round-trips it, though a restored snapshot never resumes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawSession {
    /// Start point of the next segment.
    pub start: DVec3,
    /// Source the next segment connects back to.
    pub source: Option<DrawSource>,
    pub category: PipeCategory,
    pub floor_id: u32,
    /// Lineage tag stamped onto every segment of this session.
    pub color_group: ColorGroup,
    /// Pipes committed by this session, in draw order.
    pub segments: Vec<PipeId>,
}

/// Begin a draw session at `point`. When the point sits on existing pipe
/// endpoints the source is re-resolved through smart parent selection, so a
/// branch started at a junction hangs off the upstream pipe. An explicit
/// `lineage` overrides the inherited tag.
#[allow(clippy::too_many_arguments)]
pub fn start_draw(
    network: &PipeNetwork,
    state: &mut InteractionState,
    dispatcher: &mut dyn ModeDispatcher,
    point: DVec3,
    source: Option<DrawSource>,
    category: PipeCategory,
    floor_id: u32,
    lineage: Option<ColorGroup>,
) -> bool {
    if !state.is_idle() {
        return false;
    }

    let source = match source {
        Some(DrawSource::Pipe(_)) | None => network
            .smart_parent_at(point)
            .map(DrawSource::Pipe)
            .or(source),
        explicit => explicit,
    };

    let color_group = lineage.unwrap_or_else(|| inherited_lineage(network, source));
    state.draw = Some(DrawSession {
        start: point,
        source,
        category,
        floor_id,
        color_group,
        segments: Vec::new(),
    });
    dispatcher.request_mode(EditorMode::DrawPipe);
    true
}

/// Snap-adjust a cursor position for the active session's pending segment
/// and publish the winning candidate for the renderer. Falls back to the
/// raw cursor when nothing snaps.
pub fn preview_point(
    network: &PipeNetwork,
    state: &mut InteractionState,
    walls: &[Wall],
    cursor: DVec3,
) -> DVec3 {
    let Some(session) = state.draw.as_ref() else {
        state.active_snap = None;
        return cursor;
    };
    let candidate = snap_point(
        network,
        walls,
        session.floor_id,
        geom::plan(cursor),
        Some(geom::plan(session.start)),
        session.segments.last().copied(),
    );
    state.active_snap = candidate;
    match candidate {
        Some(c) => geom::lift(c.point, cursor.z),
        None => cursor,
    }
}

/// Commit the next segment of the active session, from the session's start
/// point to `point`. On success the new pipe becomes the source for the
/// following segment. Returns `None` (session unchanged) when the point is
/// invalid.
pub fn confirm_point(
    network: &mut PipeNetwork,
    state: &mut InteractionState,
    point: DVec3,
) -> Option<PipeId> {
    let session = state.draw.as_ref()?;
    let start = session.start;

    let min = 2.0 * session.category.edge_margin();
    if (point - start).length() < min {
        return None;
    }
    let query = ProtectedPointQuery {
        exclude_pipe: None,
        // Drawing away from a junction is legal; landing on one is not.
        exclude_origin: Some(start),
        suppress_free_endpoints: false,
    };
    if is_protected_point(network, point, &query) {
        log::debug!("draw point rejected: protected point");
        return None;
    }

    let mut pipe = Pipe::new(start, point, session.category, session.floor_id);
    pipe.color_group = session.color_group;
    pipe.start_connection = session.source.map(DrawSource::connection);
    let id = network.add_pipe(pipe);
    wire_source_forward(network, state.draw.as_ref().and_then(|s| s.source), id);
    network.refresh_end_caps();

    if let Some(session) = state.draw.as_mut() {
        session.start = point;
        session.source = Some(DrawSource::Pipe(id));
        session.segments.push(id);
    }
    Some(id)
}

/// End the session, keeping everything committed so far. Returns the drawn
/// pipes in order.
pub fn finish_draw(state: &mut InteractionState, dispatcher: &mut dyn ModeDispatcher) -> Vec<PipeId> {
    let segments = state.draw.take().map(|s| s.segments).unwrap_or_default();
    dispatcher.request_mode(EditorMode::Select);
    segments
}

/// Abandon the pending start point. Segments already committed stay in the
/// network; undo is the history ring's job, not the abort's.
pub fn abort_draw(state: &mut InteractionState, dispatcher: &mut dyn ModeDispatcher) {
    state.draw = None;
    dispatcher.request_mode(EditorMode::Select);
}

/// Lineage inherited from the source: post-meter below a meter, pre-meter
/// below a service box, copied from a source pipe.
fn inherited_lineage(network: &PipeNetwork, source: Option<DrawSource>) -> ColorGroup {
    match source {
        Some(DrawSource::Meter(_)) => ColorGroup::PostMeter,
        Some(DrawSource::ServiceBox(_)) => ColorGroup::PreMeter,
        Some(DrawSource::Pipe(id)) => network
            .pipe(id)
            .map(|p| p.color_group)
            .unwrap_or_default(),
        None => ColorGroup::default(),
    }
}

/// Record the downstream side of the new link on the source entity: a meter
/// learns its rigid outlet pipe, a service box its attached pipe. Pipe
/// sources carry no forward reference.
fn wire_source_forward(network: &mut PipeNetwork, source: Option<DrawSource>, new_pipe: PipeId) {
    match source {
        Some(DrawSource::Meter(id)) => {
            if let Some(Fitting::Meter(m)) = network.fitting_mut(id) {
                if m.outlet_pipe.is_none() {
                    m.outlet_pipe = Some(new_pipe);
                }
            }
        }
        Some(DrawSource::ServiceBox(id)) => {
            if let Some(Fitting::ServiceBox(s)) = network.fitting_mut(id) {
                if s.attached_pipe.is_none() {
                    s.attached_pipe = Some(new_pipe);
                }
            }
        }
        _ => {}
    }
}
