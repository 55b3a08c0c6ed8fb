//! Fitting variants: valves, meters, devices, chimneys and service boxes.

use super::pipe::{PipeEnd, PipeId};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for fittings.
pub type FittingId = Uuid;

/// Axial footprint a valve occupies on its pipe.
pub const VALVE_WIDTH: f64 = 8.0;
/// Extra clearance kept between an auto-created valve and the pipe end.
pub const VALVE_EDGE_CLEARANCE: f64 = 2.0;
/// Distance between a meter's inlet and outlet ports.
pub const METER_WIDTH: f64 = 20.0;
/// Distance from a service box center to its outlet port.
pub const SERVICE_BOX_OUTLET_OFFSET: f64 = 10.0;

/// Keeps a valve at a constant absolute distance from one pipe endpoint as
/// the pipe is resized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedAnchor {
    /// The endpoint the distance is measured from.
    pub from_end: PipeEnd,
    /// Absolute distance from that endpoint.
    pub distance: f64,
}

/// An in-line shutoff valve positioned along a pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valve {
    pub id: FittingId,
    pub position: DVec3,
    pub rotation: f64,
    pub floor_id: u32,
    /// Pipe the valve sits on.
    pub attached_pipe: Option<PipeId>,
    /// Normalized position along the attached pipe.
    pub t: f64,
    /// Optional fixed-distance positioning rule.
    #[serde(default)]
    pub anchor: Option<FixedAnchor>,
    /// Derived: true when the valve sits at a pipe end with no further
    /// connection. Recomputed after every topology change.
    #[serde(default)]
    pub end_cap_visible: bool,
}

impl Valve {
    pub fn new(position: DVec3, floor_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            floor_id,
            attached_pipe: None,
            t: 0.5,
            anchor: None,
            end_cap_visible: false,
        }
    }

    /// Axial space the valve consumes on its pipe.
    pub fn footprint(&self) -> f64 {
        VALVE_WIDTH
    }
}

/// A flexible (drift-tolerant) connection from a fitting to a pipe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexConnection {
    pub pipe: PipeId,
    pub end: PipeEnd,
}

/// A gas meter: flexible inlet, rigid outlet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    pub id: FittingId,
    pub position: DVec3,
    pub rotation: f64,
    pub floor_id: u32,
    /// Inlet connection; elastic, tolerates positional drift.
    pub inlet: Option<FlexConnection>,
    /// Outlet pipe; must start exactly at the meter's outlet point.
    pub outlet_pipe: Option<PipeId>,
    /// The valve guarding the inlet.
    pub valve: Option<FittingId>,
}

impl Meter {
    pub fn new(position: DVec3, floor_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            floor_id,
            inlet: None,
            outlet_pipe: None,
            valve: None,
        }
    }

    /// Local port offset rotated into world space, at the meter's height.
    fn port(&self, local_x: f64) -> DVec3 {
        let (sin, cos) = self.rotation.sin_cos();
        DVec3::new(
            self.position.x + local_x * cos,
            self.position.y + local_x * sin,
            self.position.z,
        )
    }

    /// World position of the inlet port.
    pub fn inlet_point(&self) -> DVec3 {
        self.port(-METER_WIDTH / 2.0)
    }

    /// World position of the outlet port.
    pub fn outlet_point(&self) -> DVec3 {
        self.port(METER_WIDTH / 2.0)
    }

    /// Center position that places the inlet port exactly at `inlet`,
    /// given the orientation `rotation`.
    pub fn center_for_inlet(inlet: DVec3, rotation: f64) -> DVec3 {
        let (sin, cos) = rotation.sin_cos();
        let half = METER_WIDTH / 2.0;
        DVec3::new(inlet.x + half * cos, inlet.y + half * sin, inlet.z)
    }
}

/// A consuming appliance fed from a pipe endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: FittingId,
    pub position: DVec3,
    pub rotation: f64,
    pub floor_id: u32,
    /// Inlet connection; elastic, tolerates positional drift.
    pub inlet: Option<FlexConnection>,
    /// The valve guarding the inlet (auto-created when absent).
    pub valve: Option<FittingId>,
    /// Exhaust chimney owned by this device, if any.
    pub chimney: Option<FittingId>,
}

impl Device {
    pub fn new(position: DVec3, floor_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            floor_id,
            inlet: None,
            valve: None,
            chimney: None,
        }
    }
}

/// One rigid run of a chimney.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChimneySegment {
    pub p1: DVec3,
    pub p2: DVec3,
}

/// Terminal vent fixture capping a chimney.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VentFixture {
    pub position: DVec3,
    pub rotation: f64,
}

/// An exhaust chimney owned by exactly one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chimney {
    pub id: FittingId,
    pub position: DVec3,
    pub rotation: f64,
    pub floor_id: u32,
    /// The owning device; the chimney dies with it.
    pub parent_device: FittingId,
    /// Ordered rigid segments from the device upward.
    pub segments: Vec<ChimneySegment>,
    /// Optional terminal vent.
    #[serde(default)]
    pub vent: Option<VentFixture>,
}

impl Chimney {
    pub fn new(position: DVec3, floor_id: u32, parent_device: FittingId) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            floor_id,
            parent_device,
            segments: Vec::new(),
            vent: None,
        }
    }
}

/// The unique root source of a network branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBox {
    pub id: FittingId,
    pub position: DVec3,
    pub rotation: f64,
    pub floor_id: u32,
    /// True when the box is snapped flush against a wall; flips the outlet
    /// to the room-facing side.
    #[serde(default)]
    pub wall_snapped: bool,
    /// At most one pipe may leave the box.
    pub attached_pipe: Option<PipeId>,
}

impl ServiceBox {
    pub fn new(position: DVec3, floor_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            floor_id,
            wall_snapped: false,
            attached_pipe: None,
        }
    }

    /// World position of the outlet port, derived from position, rotation
    /// and wall-snap state.
    pub fn outlet_point(&self) -> DVec3 {
        let side = if self.wall_snapped { -1.0 } else { 1.0 };
        let (sin, cos) = self.rotation.sin_cos();
        let off = SERVICE_BOX_OUTLET_OFFSET * side;
        DVec3::new(
            self.position.x + off * cos,
            self.position.y + off * sin,
            self.position.z,
        )
    }
}

/// Enum wrapper over all fitting variants (for storage and serialization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Fitting {
    Valve(Valve),
    Meter(Meter),
    Device(Device),
    Chimney(Chimney),
    ServiceBox(ServiceBox),
}

impl Fitting {
    pub fn id(&self) -> FittingId {
        match self {
            Fitting::Valve(f) => f.id,
            Fitting::Meter(f) => f.id,
            Fitting::Device(f) => f.id,
            Fitting::Chimney(f) => f.id,
            Fitting::ServiceBox(f) => f.id,
        }
    }

    pub fn position(&self) -> DVec3 {
        match self {
            Fitting::Valve(f) => f.position,
            Fitting::Meter(f) => f.position,
            Fitting::Device(f) => f.position,
            Fitting::Chimney(f) => f.position,
            Fitting::ServiceBox(f) => f.position,
        }
    }

    pub fn set_position(&mut self, position: DVec3) {
        match self {
            Fitting::Valve(f) => f.position = position,
            Fitting::Meter(f) => f.position = position,
            Fitting::Device(f) => f.position = position,
            Fitting::Chimney(f) => f.position = position,
            Fitting::ServiceBox(f) => f.position = position,
        }
    }

    /// Translate the fitting (and its derived geometry) by `delta`.
    pub fn translate(&mut self, delta: DVec3) {
        self.set_position(self.position() + delta);
        if let Fitting::Chimney(c) = self {
            for seg in &mut c.segments {
                seg.p1 += delta;
                seg.p2 += delta;
            }
            if let Some(v) = &mut c.vent {
                v.position += delta;
            }
        }
    }

    pub fn rotation(&self) -> f64 {
        match self {
            Fitting::Valve(f) => f.rotation,
            Fitting::Meter(f) => f.rotation,
            Fitting::Device(f) => f.rotation,
            Fitting::Chimney(f) => f.rotation,
            Fitting::ServiceBox(f) => f.rotation,
        }
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        match self {
            Fitting::Valve(f) => f.rotation = rotation,
            Fitting::Meter(f) => f.rotation = rotation,
            Fitting::Device(f) => f.rotation = rotation,
            Fitting::Chimney(f) => f.rotation = rotation,
            Fitting::ServiceBox(f) => f.rotation = rotation,
        }
    }

    pub fn floor_id(&self) -> u32 {
        match self {
            Fitting::Valve(f) => f.floor_id,
            Fitting::Meter(f) => f.floor_id,
            Fitting::Device(f) => f.floor_id,
            Fitting::Chimney(f) => f.floor_id,
            Fitting::ServiceBox(f) => f.floor_id,
        }
    }

    /// Variant name for error and log messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Fitting::Valve(_) => "Valve",
            Fitting::Meter(_) => "Meter",
            Fitting::Device(_) => "Device",
            Fitting::Chimney(_) => "Chimney",
            Fitting::ServiceBox(_) => "ServiceBox",
        }
    }

    pub fn as_valve(&self) -> Option<&Valve> {
        match self {
            Fitting::Valve(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_valve_mut(&mut self) -> Option<&mut Valve> {
        match self {
            Fitting::Valve(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_meter(&self) -> Option<&Meter> {
        match self {
            Fitting::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_meter_mut(&mut self) -> Option<&mut Meter> {
        match self {
            Fitting::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Fitting::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_device_mut(&mut self) -> Option<&mut Device> {
        match self {
            Fitting::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_chimney(&self) -> Option<&Chimney> {
        match self {
            Fitting::Chimney(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_service_box(&self) -> Option<&ServiceBox> {
        match self {
            Fitting::ServiceBox(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_service_box_mut(&mut self) -> Option<&mut ServiceBox> {
        match self {
            Fitting::ServiceBox(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_ports_unrotated() {
        let m = Meter::new(DVec3::new(100.0, 50.0, 0.0), 0);
        assert_eq!(m.inlet_point(), DVec3::new(90.0, 50.0, 0.0));
        assert_eq!(m.outlet_point(), DVec3::new(110.0, 50.0, 0.0));
    }

    #[test]
    fn test_meter_ports_rotated_quarter_turn() {
        let mut m = Meter::new(DVec3::new(0.0, 0.0, 0.0), 0);
        m.rotation = std::f64::consts::FRAC_PI_2;
        let inlet = m.inlet_point();
        assert!(inlet.x.abs() < 1e-9);
        assert!((inlet.y + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_meter_center_for_inlet_round_trip() {
        let inlet = DVec3::new(25.0, 30.0, 5.0);
        let rotation = 0.7;
        let center = Meter::center_for_inlet(inlet, rotation);
        let mut m = Meter::new(center, 0);
        m.rotation = rotation;
        assert!((m.inlet_point() - inlet).length() < 1e-9);
    }

    #[test]
    fn test_service_box_outlet_flips_with_wall_snap() {
        let mut sb = ServiceBox::new(DVec3::new(0.0, 0.0, 0.0), 0);
        assert_eq!(sb.outlet_point(), DVec3::new(10.0, 0.0, 0.0));
        sb.wall_snapped = true;
        assert_eq!(sb.outlet_point(), DVec3::new(-10.0, 0.0, 0.0));
    }

    #[test]
    fn test_chimney_translate_carries_segments() {
        let device = Uuid::new_v4();
        let mut c = Chimney::new(DVec3::ZERO, 0, device);
        c.segments.push(ChimneySegment {
            p1: DVec3::ZERO,
            p2: DVec3::new(0.0, 0.0, 50.0),
        });
        c.vent = Some(VentFixture {
            position: DVec3::new(0.0, 0.0, 50.0),
            rotation: 0.0,
        });
        let mut f = Fitting::Chimney(c);
        f.translate(DVec3::new(5.0, 0.0, 0.0));
        let c = f.as_chimney().unwrap();
        assert_eq!(c.segments[0].p2, DVec3::new(5.0, 0.0, 50.0));
        assert_eq!(c.vent.unwrap().position, DVec3::new(5.0, 0.0, 50.0));
    }
}
