//! Pipe segments and their connection descriptors.

use crate::geom::{self, Axis};
use glam::DVec3;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for pipes.
pub type PipeId = Uuid;

/// One of the two endpoints of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipeEnd {
    Start,
    End,
}

impl PipeEnd {
    /// The other endpoint.
    pub fn opposite(self) -> Self {
        match self {
            PipeEnd::Start => PipeEnd::End,
            PipeEnd::End => PipeEnd::Start,
        }
    }
}

/// What a connection descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Pipe,
    Meter,
    ServiceBox,
}

/// A directed reference from one pipe endpoint to its source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub target: Uuid,
}

impl Connection {
    pub fn pipe(target: PipeId) -> Self {
        Self {
            kind: ConnectionKind::Pipe,
            target,
        }
    }

    pub fn meter(target: Uuid) -> Self {
        Self {
            kind: ConnectionKind::Meter,
            target,
        }
    }

    pub fn service_box(target: Uuid) -> Self {
        Self {
            kind: ConnectionKind::ServiceBox,
            target,
        }
    }
}

/// Pipe kind; affects rendered width and the margins kept at each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipeCategory {
    /// Main supply run.
    Main,
    /// Distribution branch.
    #[default]
    Branch,
    /// Flexible connector.
    Flex,
}

impl PipeCategory {
    /// Rendered width of the pipe.
    pub fn width(self) -> f64 {
        match self {
            PipeCategory::Main => 6.0,
            PipeCategory::Branch => 4.0,
            PipeCategory::Flex => 3.0,
        }
    }

    /// Margin kept free of fittings at each pipe end.
    pub fn edge_margin(self) -> f64 {
        match self {
            PipeCategory::Main => 6.0,
            PipeCategory::Branch => 5.0,
            PipeCategory::Flex => 4.0,
        }
    }
}

/// Lineage tag propagated through branches: whether the segment sits before
/// or after a meter. Used for display and for connection-rule decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorGroup {
    #[default]
    PreMeter,
    PostMeter,
}

/// A straight pipe segment between two 3D nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipe {
    pub id: PipeId,
    /// Start endpoint.
    pub p1: DVec3,
    /// End endpoint.
    pub p2: DVec3,
    pub category: PipeCategory,
    pub floor_id: u32,
    pub color_group: ColorGroup,
    /// Upstream connection of `p1`, if any.
    #[serde(default)]
    pub start_connection: Option<Connection>,
    /// Downstream connection of `p2`, if any.
    #[serde(default)]
    pub end_connection: Option<Connection>,
}

impl Pipe {
    /// Create an unconnected pipe.
    pub fn new(p1: DVec3, p2: DVec3, category: PipeCategory, floor_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            p1,
            p2,
            category,
            floor_id,
            color_group: ColorGroup::default(),
            start_connection: None,
            end_connection: None,
        }
    }

    /// 3D Euclidean length.
    pub fn length(&self) -> f64 {
        (self.p2 - self.p1).length()
    }

    /// Normalized direction start→end, or `None` for a degenerate pipe.
    pub fn direction(&self) -> Option<DVec3> {
        let d = self.p2 - self.p1;
        if d.length_squared() < f64::EPSILON {
            None
        } else {
            Some(d.normalize())
        }
    }

    /// Position of the given endpoint.
    pub fn endpoint(&self, end: PipeEnd) -> DVec3 {
        match end {
            PipeEnd::Start => self.p1,
            PipeEnd::End => self.p2,
        }
    }

    /// Move the given endpoint.
    pub fn set_endpoint(&mut self, end: PipeEnd, point: DVec3) {
        match end {
            PipeEnd::Start => self.p1 = point,
            PipeEnd::End => self.p2 = point,
        }
    }

    /// Connection descriptor of the given endpoint.
    pub fn connection(&self, end: PipeEnd) -> Option<&Connection> {
        match end {
            PipeEnd::Start => self.start_connection.as_ref(),
            PipeEnd::End => self.end_connection.as_ref(),
        }
    }

    /// Replace the connection descriptor of the given endpoint.
    pub fn set_connection(&mut self, end: PipeEnd, connection: Option<Connection>) {
        match end {
            PipeEnd::Start => self.start_connection = connection,
            PipeEnd::End => self.end_connection = connection,
        }
    }

    /// Point at normalized position `t` along the pipe (0 = start, 1 = end).
    pub fn point_at(&self, t: f64) -> DVec3 {
        self.p1 + (self.p2 - self.p1) * t.clamp(0.0, 1.0)
    }

    /// Project a 3D point onto the pipe; returns the clamped parameter and
    /// the foot point.
    pub fn project(&self, point: DVec3) -> (f64, DVec3) {
        geom::project_onto_segment_3d(point, self.p1, self.p2)
    }

    /// Normalized position at the given absolute distance from an endpoint.
    pub fn t_at_distance(&self, from: PipeEnd, distance: f64) -> f64 {
        let len = self.length();
        if len < f64::EPSILON {
            return 0.0;
        }
        let t = (distance / len).clamp(0.0, 1.0);
        match from {
            PipeEnd::Start => t,
            PipeEnd::End => 1.0 - t,
        }
    }

    /// Which endpoint of this pipe is geometrically closer to `point`.
    pub fn closer_end(&self, point: DVec3) -> PipeEnd {
        if (point - self.p1).length_squared() <= (point - self.p2).length_squared() {
            PipeEnd::Start
        } else {
            PipeEnd::End
        }
    }

    /// Plan-plane endpoints.
    pub fn plan_segment(&self) -> (Point, Point) {
        (geom::plan(self.p1), geom::plan(self.p2))
    }

    /// The world axis along which the pipe extends the most. A body drag
    /// may not translate the pipe along this axis.
    pub fn principal_axis(&self) -> Axis {
        Axis::dominant(self.p2 - self.p1)
    }

    /// True when the pipes' directions are parallel within `tol_deg` degrees
    /// (either orientation).
    pub fn is_colinear_with(&self, other: &Pipe, tol_deg: f64) -> bool {
        let (Some(a), Some(b)) = (self.direction(), other.direction()) else {
            return false;
        };
        let cos = a.dot(b).abs().clamp(0.0, 1.0);
        cos.acos().to_degrees() <= tol_deg
    }
}
