//! Wall plan data consumed read-only by the snap system and endpoint drag.
//!
//! Walls are owned by the floor-plan collaborator; the engine only derives
//! snap guides from them.

use crate::geom::{self, offset_segment, point_to_segment_dist};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Clearance kept between a routed pipe and a wall surface.
pub const WALL_CLEARANCE: f64 = 5.0;

/// A wall segment from the floor plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wall {
    /// Centerline start.
    pub p1: Point,
    /// Centerline end.
    pub p2: Point,
    /// Wall thickness.
    pub thickness: f64,
    /// Floor the wall belongs to.
    pub floor_id: u32,
}

/// A snap guide offset from a wall surface.
#[derive(Debug, Clone, Copy)]
pub struct ServiceLine {
    pub p1: Point,
    pub p2: Point,
}

impl Wall {
    /// Create a wall segment.
    pub fn new(p1: Point, p2: Point, thickness: f64, floor_id: u32) -> Self {
        Self {
            p1,
            p2,
            thickness,
            floor_id,
        }
    }

    /// The two service lines for this wall: the centerline offset by half the
    /// thickness plus `clearance`, one per side.
    pub fn service_lines(&self, clearance: f64) -> Vec<ServiceLine> {
        let offset = self.thickness / 2.0 + clearance;
        let mut lines = Vec::with_capacity(2);
        for sign in [1.0, -1.0] {
            if let Some((a, b)) = offset_segment(self.p1, self.p2, sign * offset) {
                lines.push(ServiceLine { p1: a, p2: b });
            }
        }
        lines
    }

    /// True when a plan point lies strictly inside the wall's thickness band.
    /// Points inside the band are forbidden as free-projection snap targets.
    pub fn thickness_band_contains(&self, point: Point) -> bool {
        let dist = point_to_segment_dist(point, self.p1, self.p2);
        // Strict interior only: the surfaces themselves are legal.
        dist < self.thickness / 2.0 - geom::COINCIDENT_EPSILON
    }
}

/// Collect the service lines of every wall on the given floor.
pub fn service_lines_on_floor(walls: &[Wall], floor_id: u32, clearance: f64) -> Vec<ServiceLine> {
    walls
        .iter()
        .filter(|w| w.floor_id == floor_id)
        .flat_map(|w| w.service_lines(clearance))
        .collect()
}
