//! Prioritized snap-point search for drawing and dragging.
//!
//! Given the cursor, the floor's walls and the existing network, the search
//! runs a fixed sequence of stages from strongest to weakest guide; the first
//! stage producing a candidate wins. Stages are gated by the angular
//! deviation from the user's drawing direction so a snap never pulls the
//! cursor backwards against intent.

use crate::geom::{
    self, direction_deviation_deg, ortho_lock, project_onto_segment, segment_intersection,
};
use crate::network::{PipeId, PipeNetwork};
use crate::walls::{ServiceLine, WALL_CLEARANCE, Wall, service_lines_on_floor};
use kurbo::Point;

/// Capture radius of every snap stage.
pub const SNAP_RADIUS: f64 = 10.0;
/// Maximum deviation of a candidate from the drawing direction.
pub const DIRECTION_GATE_DEG: f64 = 40.0;
/// A perpendicular foot is offered only when the user is drawing within this
/// angle of the perpendicular itself.
pub const PERPENDICULAR_GATE_DEG: f64 = 30.0;
/// Tolerance for locking to the orthogonal directions as a last resort.
pub const ORTHO_LOCK_TOLERANCE_DEG: f64 = 5.0;

/// What kind of guide produced a snap candidate. Exposed so the renderer can
/// style the feedback per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    /// Crossing of two wall service lines.
    ServiceLineIntersection,
    /// Crossing of the in-progress segment with an existing pipe.
    PipeIntersection,
    /// An existing pipe endpoint (connection point).
    PipeEndpoint,
    /// Foot of the perpendicular from the draw start onto a guide.
    PerpendicularFoot,
    /// Closest point on a service line or pipe.
    OnLine,
    /// Locked to 0/90/180/270 degrees from the draw start.
    OrthoLock,
}

/// A proposed snap point.
#[derive(Debug, Clone, Copy)]
pub struct SnapCandidate {
    pub point: Point,
    pub kind: SnapKind,
}

/// Find the best snap point for `cursor`.
///
/// `draw_start` is the fixed start of the in-progress segment, if a draw is
/// active; `skip_pipe` is the pipe currently being created, which every stage
/// must ignore.
pub fn snap_point(
    network: &PipeNetwork,
    walls: &[Wall],
    floor_id: u32,
    cursor: Point,
    draw_start: Option<Point>,
    skip_pipe: Option<PipeId>,
) -> Option<SnapCandidate> {
    let service_lines = service_lines_on_floor(walls, floor_id, WALL_CLEARANCE);
    let pipe_segments: Vec<(Point, Point)> = network
        .pipes()
        .filter(|p| p.floor_id == floor_id && Some(p.id) != skip_pipe)
        .map(|p| p.plan_segment())
        .collect();
    let pipe_endpoints: Vec<Point> = pipe_segments
        .iter()
        .flat_map(|&(a, b)| [a, b])
        .collect();

    let gate = |candidate: Point| match draw_start {
        Some(start) => {
            direction_deviation_deg(start, cursor, candidate) <= DIRECTION_GATE_DEG
        }
        None => true,
    };

    // Stage 1: service line crossings.
    if let Some(c) = best_candidate(
        service_line_intersections(&service_lines),
        cursor,
        SNAP_RADIUS,
        &gate,
        SnapKind::ServiceLineIntersection,
    ) {
        return Some(c);
    }

    // Stage 2: the in-progress segment crossing an existing pipe.
    if let Some(start) = draw_start {
        let crossings = pipe_segments
            .iter()
            .filter_map(|&(a, b)| segment_intersection(start, cursor, a, b));
        if let Some(c) = best_candidate(
            crossings,
            cursor,
            SNAP_RADIUS,
            &gate,
            SnapKind::PipeIntersection,
        ) {
            return Some(c);
        }
    }

    // Stage 3: existing pipe endpoints.
    if let Some(c) = best_candidate(
        pipe_endpoints.iter().copied(),
        cursor,
        SNAP_RADIUS,
        &gate,
        SnapKind::PipeEndpoint,
    ) {
        return Some(c);
    }

    // Stage 4: perpendicular feet from the draw start.
    if let Some(start) = draw_start {
        let feet = service_lines
            .iter()
            .map(|l| (l.p1, l.p2))
            .chain(pipe_segments.iter().copied())
            .map(|(a, b)| project_onto_segment(start, a, b).point)
            .filter(|&foot| {
                direction_deviation_deg(start, cursor, foot) <= PERPENDICULAR_GATE_DEG
            });
        if let Some(c) = best_candidate(
            feet,
            cursor,
            SNAP_RADIUS,
            &|_| true, // already gated by the perpendicular test
            SnapKind::PerpendicularFoot,
        ) {
            return Some(c);
        }
    }

    // Stage 5: free projection onto a guide, outside wall thickness bands.
    let projections = service_lines
        .iter()
        .map(|l| (l.p1, l.p2))
        .chain(pipe_segments.iter().copied())
        .map(|(a, b)| project_onto_segment(cursor, a, b).point)
        .filter(|&p| !inside_any_wall(walls, floor_id, p));
    if let Some(c) = best_candidate(projections, cursor, SNAP_RADIUS, &gate, SnapKind::OnLine) {
        return Some(c);
    }

    // Stage 6: orthogonal lock from the draw start, regardless of distance.
    if let Some(start) = draw_start {
        if let Some(lock) = ortho_lock(start, cursor, ORTHO_LOCK_TOLERANCE_DEG) {
            return Some(SnapCandidate {
                point: lock.point,
                kind: SnapKind::OrthoLock,
            });
        }
    }

    None
}

/// All pairwise crossings of the service lines.
fn service_line_intersections(lines: &[ServiceLine]) -> Vec<Point> {
    let mut points = Vec::new();
    for (i, a) in lines.iter().enumerate() {
        for b in &lines[i + 1..] {
            if let Some(p) = segment_intersection(a.p1, a.p2, b.p1, b.p2) {
                points.push(p);
            }
        }
    }
    points
}

/// True when a plan point falls strictly inside any wall's thickness band on
/// the given floor.
fn inside_any_wall(walls: &[Wall], floor_id: u32, point: Point) -> bool {
    walls
        .iter()
        .filter(|w| w.floor_id == floor_id)
        .any(|w| w.thickness_band_contains(point))
}

/// The candidate nearest the cursor that lies within `radius` and passes the
/// direction gate.
fn best_candidate(
    candidates: impl IntoIterator<Item = Point>,
    cursor: Point,
    radius: f64,
    gate: &dyn Fn(Point) -> bool,
    kind: SnapKind,
) -> Option<SnapCandidate> {
    let mut best: Option<Point> = None;
    let mut best_dist = radius;
    for candidate in candidates {
        let dist = cursor.distance(candidate);
        if dist <= best_dist + geom::COINCIDENT_EPSILON && gate(candidate) {
            // Strictly closer, or equal and found earlier stays.
            if dist < best_dist || best.is_none() {
                best_dist = dist;
                best = Some(candidate);
            }
        }
    }
    best.map(|point| SnapCandidate { point, kind })
}
