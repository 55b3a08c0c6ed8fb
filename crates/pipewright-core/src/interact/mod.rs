//! Interaction engine: drags, slides and rotations over the network.
//!
//! All interaction bookkeeping lives in an explicit [`InteractionState`]
//! passed into free functions together with the network; there is no ambient
//! drag context. Exactly one interaction may be active at a time.

mod body_drag;
mod endpoint_drag;
mod protect;
mod rotate;
mod slide;

pub use body_drag::{
    BodyDrag, BodyDragMode, BridgeAnchor, begin_body_drag, finish_body_drag, update_body_drag,
};
pub use endpoint_drag::{
    EndpointDrag, begin_endpoint_drag, finish_endpoint_drag, update_endpoint_drag,
};
pub use protect::{ProtectedPointQuery, is_protected_point};
pub use rotate::{rotate_fitting, rotate_meter_fixed_pivot};
pub use slide::slide_valve;

use crate::draw::DrawSession;
use crate::geom::Axis;
use crate::snap::SnapCandidate;
use glam::DVec3;

/// Plan tolerance of the protected-point test.
pub const PROTECT_PLAN_TOLERANCE: f64 = 10.0;
/// Vertical tolerance of the protected-point test.
pub const PROTECT_Z_TOLERANCE: f64 = 8.0;
/// Collision tolerance against a foreign endpoint that is itself a junction.
pub const JUNCTION_COLLISION_TOLERANCE: f64 = 8.0;
/// Collision tolerance against an ordinary foreign endpoint.
pub const ENDPOINT_COLLISION_TOLERANCE: f64 = 1.5;
/// Capture radius of wall-surface snapping during endpoint drag.
pub const WALL_SNAP_CAPTURE: f64 = 10.0;
/// Capture radius of orthogonal alignment snapping during endpoint drag.
pub const ALIGNMENT_SNAP_TOLERANCE: f64 = 6.0;
/// Pipes within this angle of parallel form a chain for body dragging.
pub const CHAIN_PARALLEL_TOLERANCE_DEG: f64 = 20.0;

/// A preview pipe shown during a drag but not yet part of the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostPipe {
    pub p1: DVec3,
    pub p2: DVec3,
}

/// All mutable state of the interaction engine. Reset at the start and end
/// of every interaction and whenever a history snapshot is restored.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    /// True while an endpoint or body drag is active.
    pub is_dragging: bool,
    /// Active endpoint drag, if any.
    pub endpoint_drag: Option<EndpointDrag>,
    /// Active body drag, if any.
    pub body_drag: Option<BodyDrag>,
    /// True when drags are constrained to a single world axis (3D mode).
    pub axis_mode: bool,
    /// Axis explicitly locked by the user (via an axis handle); `None` means
    /// the axis is chosen from the movement direction.
    pub locked_axis: Option<Axis>,
    /// Snap candidate currently highlighted for the renderer.
    pub active_snap: Option<SnapCandidate>,
    /// Ghost bridge previews exposed during a bridge-mode body drag.
    pub ghost_bridges: Vec<GhostPipe>,
    /// In-progress draw session, if any.
    pub draw: Option<DrawSession>,
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no drag and no draw session is active.
    pub fn is_idle(&self) -> bool {
        !self.is_dragging && self.draw.is_none()
    }

    /// Clear every ephemeral field back to a neutral state. Committed
    /// topology is untouched.
    pub fn reset(&mut self) {
        *self = Self {
            axis_mode: self.axis_mode,
            ..Self::default()
        };
    }

    /// Clear drag bookkeeping only (draw sessions survive a finished drag).
    pub(crate) fn clear_drag(&mut self) {
        self.is_dragging = false;
        self.endpoint_drag = None;
        self.body_drag = None;
        self.locked_axis = None;
        self.active_snap = None;
        self.ghost_bridges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_axis_mode() {
        let mut state = InteractionState::new();
        state.axis_mode = true;
        state.is_dragging = true;
        state.ghost_bridges.push(GhostPipe {
            p1: DVec3::ZERO,
            p2: DVec3::X,
        });
        state.reset();
        assert!(state.axis_mode);
        assert!(!state.is_dragging);
        assert!(state.ghost_bridges.is_empty());
        assert!(state.is_idle());
    }
}
