//! Geometry utilities shared by the snap, topology and interaction modules.
//!
//! Plan-view (XY) math uses `kurbo::Point`/`kurbo::Vec2`; pipe nodes live in
//! 3D as `glam::DVec3` and are projected into the plan plane where needed.

use glam::DVec3;
use kurbo::{Point, Vec2};

/// Positions closer than this are treated as coincident.
pub const COINCIDENT_EPSILON: f64 = 1e-6;

/// Project a 3D node into the plan (XY) plane.
pub fn plan(p: DVec3) -> Point {
    Point::new(p.x, p.y)
}

/// Lift a plan point back into 3D, keeping the given height.
pub fn lift(p: Point, z: f64) -> DVec3 {
    DVec3::new(p.x, p.y, z)
}

/// Plan-plane distance between two 3D nodes.
pub fn plan_dist(a: DVec3, b: DVec3) -> f64 {
    plan(a).distance(plan(b))
}

/// True when two 3D nodes coincide within a plan tolerance and a separate
/// vertical tolerance.
pub fn points_coincide(a: DVec3, b: DVec3, plan_tol: f64, z_tol: f64) -> bool {
    plan_dist(a, b) <= plan_tol && (a.z - b.z).abs() <= z_tol
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProjection {
    /// Clamped parameter along the segment (0 = start, 1 = end).
    pub t: f64,
    /// The foot point on the segment.
    pub point: Point,
    /// Distance from the query point to the foot point.
    pub distance: f64,
}

/// Project a plan point onto the segment a→b, clamping to the segment.
pub fn project_onto_segment(point: Point, a: Point, b: Point) -> SegmentProjection {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return SegmentProjection {
            t: 0.0,
            point: a,
            distance: pv.hypot(),
        };
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let foot = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    SegmentProjection {
        t,
        point: foot,
        distance: point.distance(foot),
    }
}

/// Project a 3D point onto the 3D segment a→b, clamping to the segment.
/// Returns the clamped parameter and the foot point.
pub fn project_onto_segment_3d(point: DVec3, a: DVec3, b: DVec3) -> (f64, DVec3) {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq < f64::EPSILON {
        return (0.0, a);
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    (t, a + seg * t)
}

/// Distance from a plan point to the segment a→b.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    project_onto_segment(point, a, b).distance
}

/// Intersection of the infinite lines through (a1,a2) and (b1,b2).
/// Returns `None` for (near-)parallel lines.
pub fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let d1 = Vec2::new(a2.x - a1.x, a2.y - a1.y);
    let d2 = Vec2::new(b2.x - b1.x, b2.y - b1.y);
    let denom = d1.cross(d2);
    if denom.abs() < 1e-10 {
        return None;
    }
    let diff = Vec2::new(b1.x - a1.x, b1.y - a1.y);
    let t = diff.cross(d2) / denom;
    Some(Point::new(a1.x + t * d1.x, a1.y + t * d1.y))
}

/// Intersection point of two segments, or `None` when they do not cross.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let d1 = Vec2::new(a2.x - a1.x, a2.y - a1.y);
    let d2 = Vec2::new(b2.x - b1.x, b2.y - b1.y);
    let denom = d1.cross(d2);
    if denom.abs() < 1e-10 {
        return None;
    }
    let diff = Vec2::new(b1.x - a1.x, b1.y - a1.y);
    let t = diff.cross(d2) / denom;
    let u = diff.cross(d1) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(a1.x + t * d1.x, a1.y + t * d1.y))
    } else {
        None
    }
}

/// Angle of a plan vector in degrees, normalized to [0, 360).
pub fn vector_angle_deg(v: Vec2) -> f64 {
    let angle = v.y.atan2(v.x).to_degrees();
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Absolute angular difference between two angles in degrees, in [0, 180].
pub fn angle_diff_deg(a: f64, b: f64) -> f64 {
    let mut diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        diff = 360.0 - diff;
    }
    diff
}

/// Angular deviation (degrees) of the direction start→candidate from the
/// direction start→cursor. Used to gate snap candidates against user intent.
pub fn direction_deviation_deg(start: Point, cursor: Point, candidate: Point) -> f64 {
    let intent = Vec2::new(cursor.x - start.x, cursor.y - start.y);
    let toward = Vec2::new(candidate.x - start.x, candidate.y - start.y);
    if intent.hypot2() < f64::EPSILON || toward.hypot2() < f64::EPSILON {
        return 0.0;
    }
    angle_diff_deg(vector_angle_deg(intent), vector_angle_deg(toward))
}

/// Result of locking a cursor to the nearest orthogonal direction.
#[derive(Debug, Clone, Copy)]
pub struct OrthoLock {
    /// The locked direction in degrees (0, 90, 180 or 270).
    pub angle_deg: f64,
    /// The cursor projected onto the locked ray.
    pub point: Point,
}

/// Lock the direction start→cursor to the nearest of {0°, 90°, 180°, 270°}
/// when within `tolerance_deg` of it. Distance from the start is preserved.
pub fn ortho_lock(start: Point, cursor: Point, tolerance_deg: f64) -> Option<OrthoLock> {
    let v = Vec2::new(cursor.x - start.x, cursor.y - start.y);
    let dist = v.hypot();
    if dist < COINCIDENT_EPSILON {
        return None;
    }
    let angle = vector_angle_deg(v);
    for target in [0.0, 90.0, 180.0, 270.0] {
        if angle_diff_deg(angle, target) <= tolerance_deg {
            let rad = (target as f64).to_radians();
            return Some(OrthoLock {
                angle_deg: target,
                point: Point::new(start.x + dist * rad.cos(), start.y + dist * rad.sin()),
            });
        }
    }
    None
}

/// Offset both endpoints of the segment a→b sideways by `offset`.
/// Positive offsets go to the left of the a→b direction.
pub fn offset_segment(a: Point, b: Point, offset: f64) -> Option<(Point, Point)> {
    let dir = Vec2::new(b.x - a.x, b.y - a.y);
    let len = dir.hypot();
    if len < COINCIDENT_EPSILON {
        return None;
    }
    let normal = Vec2::new(-dir.y / len, dir.x / len) * offset;
    Some((
        Point::new(a.x + normal.x, a.y + normal.y),
        Point::new(b.x + normal.x, b.y + normal.y),
    ))
}

/// World axes a 3D drag may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Unit vector of the axis.
    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }

    /// The axis whose component dominates the movement vector.
    pub fn dominant(delta: DVec3) -> Axis {
        let (ax, ay, az) = (delta.x.abs(), delta.y.abs(), delta.z.abs());
        if ax >= ay && ax >= az {
            Axis::X
        } else if ay >= az {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Project `target` onto the line through `origin` along this axis.
    pub fn constrain(self, origin: DVec3, target: DVec3) -> DVec3 {
        let u = self.unit();
        origin + u * (target - origin).dot(u)
    }

    /// Zero the component of `delta` along this axis.
    pub fn suppress(self, delta: DVec3) -> DVec3 {
        let u = self.unit();
        delta - u * delta.dot(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_onto_segment_interior() {
        let proj = project_onto_segment(
            Point::new(50.0, 10.0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        );
        assert!((proj.t - 0.5).abs() < 1e-9);
        assert_eq!(proj.point, Point::new(50.0, 0.0));
        assert!((proj.distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_onto_segment_clamps() {
        let proj = project_onto_segment(
            Point::new(-20.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        );
        assert_eq!(proj.t, 0.0);
        assert_eq!(proj.point, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_project_onto_segment_3d() {
        let (t, foot) = project_onto_segment_3d(
            DVec3::new(40.0, 5.0, 0.0),
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(100.0, 0.0, 0.0),
        );
        assert!((t - 0.4).abs() < 1e-9);
        assert!((foot - DVec3::new(40.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, -5.0),
            Point::new(5.0, 5.0),
        )
        .unwrap();
        assert_eq!(p, Point::new(5.0, 0.0));
    }

    #[test]
    fn test_line_intersection_parallel() {
        assert!(
            line_intersection(
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 5.0),
                Point::new(10.0, 5.0),
            )
            .is_none()
        );
    }

    #[test]
    fn test_segment_intersection_bounded() {
        // Infinite lines cross but the segments do not.
        assert!(
            segment_intersection(
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(20.0, -5.0),
                Point::new(20.0, 5.0),
            )
            .is_none()
        );
        let p = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, -5.0),
            Point::new(5.0, 5.0),
        )
        .unwrap();
        assert_eq!(p, Point::new(5.0, 0.0));
    }

    #[test]
    fn test_angle_diff() {
        assert!((angle_diff_deg(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angle_diff_deg(180.0, 0.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_ortho_lock_near_horizontal() {
        let lock = ortho_lock(Point::new(0.0, 0.0), Point::new(100.0, 3.0), 5.0).unwrap();
        assert_eq!(lock.angle_deg, 0.0);
        assert!(lock.point.y.abs() < 1e-9);
        // Distance preserved.
        let dist = (100.0_f64.powi(2) + 9.0).sqrt();
        assert!((lock.point.x - dist).abs() < 1e-9);
    }

    #[test]
    fn test_ortho_lock_outside_tolerance() {
        assert!(ortho_lock(Point::new(0.0, 0.0), Point::new(100.0, 30.0), 5.0).is_none());
    }

    #[test]
    fn test_offset_segment() {
        let (a, b) = offset_segment(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 2.0).unwrap();
        assert_eq!(a, Point::new(0.0, 2.0));
        assert_eq!(b, Point::new(10.0, 2.0));
    }

    #[test]
    fn test_axis_dominant() {
        assert_eq!(Axis::dominant(DVec3::new(5.0, 1.0, 1.0)), Axis::X);
        assert_eq!(Axis::dominant(DVec3::new(1.0, -5.0, 1.0)), Axis::Y);
        assert_eq!(Axis::dominant(DVec3::new(0.0, 1.0, 5.0)), Axis::Z);
    }

    #[test]
    fn test_axis_constrain() {
        let p = Axis::X.constrain(DVec3::ZERO, DVec3::new(10.0, 4.0, 2.0));
        assert_eq!(p, DVec3::new(10.0, 0.0, 0.0));
    }
}
