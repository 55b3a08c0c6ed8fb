//! The pipe network: id-indexed stores for pipes and fittings, topology
//! queries, and structural mutations (split, merge, removal with cleanup).
//!
//! All cross-references between entities are ids resolved through the
//! network's lookup tables; nothing holds a live pointer into the graph.

mod fitting;
mod hierarchy;
mod pipe;

pub use fitting::{
    Chimney, ChimneySegment, Device, Fitting, FittingId, FixedAnchor, FlexConnection, Meter,
    METER_WIDTH, SERVICE_BOX_OUTLET_OFFSET, ServiceBox, VALVE_EDGE_CLEARANCE, VALVE_WIDTH, Valve,
    VentFixture,
};
pub use hierarchy::{Hierarchy, HierarchyEntry, SMART_PARENT_RADIUS, label_for_index};
pub use pipe::{ColorGroup, Connection, ConnectionKind, Pipe, PipeCategory, PipeEnd, PipeId};

use crate::geom;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Plan tolerance within which pipe endpoints count as coincident.
pub const ENDPOINT_JOIN_TOLERANCE: f64 = 1.0;
/// Maximum distance a split point may sit off the pipe's segment.
pub const SPLIT_ON_SEGMENT_TOLERANCE: f64 = 0.5;
/// Splits closer than this to an existing corner are rejected; the caller
/// should start a new draw from the corner instead.
pub const SPLIT_CORNER_THRESHOLD: f64 = 5.0;
/// Angular tolerance for merging two pipes back into one straight run.
pub const MERGE_COLINEAR_TOLERANCE_DEG: f64 = 1.0;

/// Programmer errors at the mutating API boundary. Validation rejections are
/// not errors; they are quiet `false`/`None` returns.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unknown pipe: {0}")]
    UnknownPipe(PipeId),
    #[error("unknown fitting: {0}")]
    UnknownFitting(FittingId),
    #[error("fitting {id} is a {actual}, expected a {expected}")]
    WrongVariant {
        id: FittingId,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("split point is {distance:.3} units off pipe {pipe}")]
    SplitOffSegment { pipe: PipeId, distance: f64 },
    #[error("split point coincides with an endpoint of pipe {0}")]
    SplitAtEndpoint(PipeId),
    #[error("malformed connection descriptor: {0}")]
    MalformedConnection(String),
}

/// Result type for topology mutations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// The whole pipe network graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipeNetwork {
    pipes: HashMap<PipeId, Pipe>,
    /// Insertion order of pipes; drives deterministic iteration and labeling.
    pipe_order: Vec<PipeId>,
    fittings: HashMap<FittingId, Fitting>,
    fitting_order: Vec<FittingId>,
}

impl PipeNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty() && self.fittings.is_empty()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    pub fn fitting_count(&self) -> usize {
        self.fittings.len()
    }

    /// Add a pipe to the network.
    pub fn add_pipe(&mut self, pipe: Pipe) -> PipeId {
        let id = pipe.id;
        self.pipe_order.push(id);
        self.pipes.insert(id, pipe);
        id
    }

    /// Get a pipe by id.
    pub fn pipe(&self, id: PipeId) -> Option<&Pipe> {
        self.pipes.get(&id)
    }

    /// Get a mutable pipe by id.
    pub fn pipe_mut(&mut self, id: PipeId) -> Option<&mut Pipe> {
        self.pipes.get_mut(&id)
    }

    /// Pipes in insertion order.
    pub fn pipes(&self) -> impl Iterator<Item = &Pipe> {
        self.pipe_order.iter().filter_map(|id| self.pipes.get(id))
    }

    /// Pipe ids in insertion order.
    pub fn pipe_ids(&self) -> &[PipeId] {
        &self.pipe_order
    }

    /// Position of a pipe in insertion order.
    pub fn pipe_index(&self, id: PipeId) -> Option<usize> {
        self.pipe_order.iter().position(|&p| p == id)
    }

    /// Add a fitting to the network.
    pub fn add_fitting(&mut self, fitting: Fitting) -> FittingId {
        let id = fitting.id();
        self.fitting_order.push(id);
        self.fittings.insert(id, fitting);
        id
    }

    /// Get a fitting by id.
    pub fn fitting(&self, id: FittingId) -> Option<&Fitting> {
        self.fittings.get(&id)
    }

    /// Get a mutable fitting by id.
    pub fn fitting_mut(&mut self, id: FittingId) -> Option<&mut Fitting> {
        self.fittings.get_mut(&id)
    }

    /// Fittings in insertion order.
    pub fn fittings(&self) -> impl Iterator<Item = &Fitting> {
        self.fitting_order
            .iter()
            .filter_map(|id| self.fittings.get(id))
    }

    /// Remove a pipe, clearing every reference to it. Valves sitting on the
    /// pipe are removed with it; flexible fitting connections degrade to
    /// unconnected rather than failing.
    pub fn remove_pipe(&mut self, id: PipeId) -> Option<Pipe> {
        let removed = self.pipes.remove(&id)?;
        self.pipe_order.retain(|&p| p != id);

        for pipe in self.pipes.values_mut() {
            for end in [PipeEnd::Start, PipeEnd::End] {
                if pipe
                    .connection(end)
                    .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == id)
                {
                    pipe.set_connection(end, None);
                }
            }
        }

        let mut orphan_valves = Vec::new();
        for fitting in self.fittings.values_mut() {
            match fitting {
                Fitting::Valve(v) if v.attached_pipe == Some(id) => {
                    orphan_valves.push(v.id);
                }
                Fitting::Meter(m) => {
                    if m.inlet.is_some_and(|c| c.pipe == id) {
                        log::warn!("meter {} lost its inlet pipe", m.id);
                        m.inlet = None;
                    }
                    if m.outlet_pipe == Some(id) {
                        m.outlet_pipe = None;
                    }
                }
                Fitting::Device(d) => {
                    if d.inlet.is_some_and(|c| c.pipe == id) {
                        log::warn!("device {} lost its inlet pipe", d.id);
                        d.inlet = None;
                    }
                }
                Fitting::ServiceBox(s) => {
                    if s.attached_pipe == Some(id) {
                        s.attached_pipe = None;
                    }
                }
                _ => {}
            }
        }
        for valve in orphan_valves {
            self.remove_fitting(valve);
        }

        self.refresh_end_caps();
        Some(removed)
    }

    /// Remove a fitting, cascading and clearing references as required:
    /// removing a device removes its chimney, removing a valve detaches it
    /// from any meter/device that referenced it.
    pub fn remove_fitting(&mut self, id: FittingId) -> Option<Fitting> {
        let removed = self.fittings.remove(&id)?;
        self.fitting_order.retain(|&f| f != id);

        match &removed {
            Fitting::Device(d) => {
                if let Some(chimney) = d.chimney {
                    self.remove_fitting(chimney);
                }
            }
            Fitting::Chimney(c) => {
                let parent = c.parent_device;
                if let Some(Fitting::Device(d)) = self.fittings.get_mut(&parent) {
                    d.chimney = None;
                }
            }
            Fitting::Valve(_) => {
                for fitting in self.fittings.values_mut() {
                    match fitting {
                        Fitting::Meter(m) if m.valve == Some(id) => m.valve = None,
                        Fitting::Device(d) if d.valve == Some(id) => d.valve = None,
                        _ => {}
                    }
                }
            }
            Fitting::Meter(_) | Fitting::ServiceBox(_) => {
                let kind = match &removed {
                    Fitting::Meter(_) => ConnectionKind::Meter,
                    _ => ConnectionKind::ServiceBox,
                };
                for pipe in self.pipes.values_mut() {
                    for end in [PipeEnd::Start, PipeEnd::End] {
                        if pipe
                            .connection(end)
                            .is_some_and(|c| c.kind == kind && c.target == id)
                        {
                            pipe.set_connection(end, None);
                        }
                    }
                }
            }
        }

        self.refresh_end_caps();
        Some(removed)
    }

    /// Every pipe endpoint within `tol` (plan and vertical) of `point`.
    pub fn endpoints_at(&self, point: DVec3, tol: f64) -> Vec<(PipeId, PipeEnd)> {
        let mut hits = Vec::new();
        for pipe in self.pipes() {
            for end in [PipeEnd::Start, PipeEnd::End] {
                if geom::points_coincide(pipe.endpoint(end), point, tol, tol) {
                    hits.push((pipe.id, end));
                }
            }
        }
        hits
    }

    /// Number of coincident pipe endpoints at `point`.
    pub fn endpoint_count(&self, point: DVec3, tol: f64) -> usize {
        self.endpoints_at(point, tol).len()
    }

    /// True iff exactly one pipe endpoint touches `point`: no elbow, no
    /// junction. The only kind of endpoint a meter or device may attach to.
    pub fn is_free_endpoint(&self, point: DVec3, tol: f64) -> bool {
        self.endpoint_count(point, tol) == 1
    }

    /// Valves sitting on the given pipe, in fitting insertion order.
    pub fn valves_on_pipe(&self, pipe_id: PipeId) -> Vec<FittingId> {
        self.fittings()
            .filter_map(|f| f.as_valve())
            .filter(|v| v.attached_pipe == Some(pipe_id))
            .map(|v| v.id)
            .collect()
    }

    /// Every fitting referencing the given pipe: valves on it, meters and
    /// devices fed by it, service boxes feeding it.
    pub fn fittings_on_pipe(&self, pipe_id: PipeId) -> Vec<FittingId> {
        self.fittings()
            .filter(|f| match f {
                Fitting::Valve(v) => v.attached_pipe == Some(pipe_id),
                Fitting::Meter(m) => {
                    m.inlet.is_some_and(|c| c.pipe == pipe_id) || m.outlet_pipe == Some(pipe_id)
                }
                Fitting::Device(d) => d.inlet.is_some_and(|c| c.pipe == pipe_id),
                Fitting::Chimney(_) => false,
                Fitting::ServiceBox(s) => s.attached_pipe == Some(pipe_id),
            })
            .map(|f| f.id())
            .collect()
    }

    /// Resolved inlet endpoint position of a meter or device, if its anchor
    /// pipe still exists.
    pub fn inlet_position(&self, fitting_id: FittingId) -> Option<DVec3> {
        let inlet = match self.fittings.get(&fitting_id)? {
            Fitting::Meter(m) => m.inlet?,
            Fitting::Device(d) => d.inlet?,
            _ => return None,
        };
        Some(self.pipes.get(&inlet.pipe)?.endpoint(inlet.end))
    }

    /// True when a meter's inlet resolves to a pipe endpoint at `point`.
    pub fn has_meter_at(&self, point: DVec3, tol: f64) -> bool {
        self.fittings()
            .filter(|f| matches!(f, Fitting::Meter(_)))
            .filter_map(|f| self.inlet_position(f.id()))
            .any(|p| geom::points_coincide(p, point, tol, tol))
    }

    /// True when a device's inlet resolves to a pipe endpoint at `point`.
    pub fn has_device_at(&self, point: DVec3, tol: f64) -> bool {
        self.fittings()
            .filter(|f| matches!(f, Fitting::Device(_)))
            .filter_map(|f| self.inlet_position(f.id()))
            .any(|p| geom::points_coincide(p, point, tol, tol))
    }

    /// Walk the `start_connection` chain upward. Reaching a meter yields
    /// true, a service box or a dead end yields false. Cycles are treated
    /// as dead ends.
    pub fn has_ancestor_meter(&self, pipe_id: PipeId) -> bool {
        let mut visited = HashSet::new();
        let mut current = pipe_id;
        loop {
            if !visited.insert(current) {
                log::warn!("connection cycle at pipe {current}");
                return false;
            }
            let Some(pipe) = self.pipes.get(&current) else {
                return false;
            };
            match &pipe.start_connection {
                None => return false,
                Some(c) => match c.kind {
                    ConnectionKind::Meter => return true,
                    ConnectionKind::ServiceBox => return false,
                    ConnectionKind::Pipe => current = c.target,
                },
            }
        }
    }

    /// Pipes whose `start_connection` points at the given pipe, in insertion
    /// order (the branch fan-out of a T-junction).
    pub fn children_of(&self, pipe_id: PipeId) -> Vec<PipeId> {
        self.pipes()
            .filter(|p| {
                p.start_connection
                    .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == pipe_id)
            })
            .map(|p| p.id)
            .collect()
    }

    /// Minimum legal length of a pipe: both edge margins plus the axial
    /// footprint of every valve on it.
    pub fn min_length(&self, pipe_id: PipeId) -> f64 {
        let Some(pipe) = self.pipes.get(&pipe_id) else {
            return 0.0;
        };
        let valves: f64 = self
            .valves_on_pipe(pipe_id)
            .iter()
            .filter_map(|&v| self.fittings.get(&v)?.as_valve().map(Valve::footprint))
            .sum();
        2.0 * pipe.category.edge_margin() + valves
    }

    /// Recompute the derived `end_cap_visible` flag of every valve: visible
    /// when the valve sits in the end region of a pipe whose endpoint has no
    /// further connection, no coincident pipe, and no meter or device.
    pub fn refresh_end_caps(&mut self) {
        let mut updates = Vec::new();
        for fitting in self.fittings() {
            let Some(valve) = fitting.as_valve() else {
                continue;
            };
            let visible = valve.attached_pipe.and_then(|pid| {
                let pipe = self.pipes.get(&pid)?;
                let pos = pipe.point_at(valve.t);
                let end_region = pipe.category.edge_margin() + valve.footprint();
                let end = pipe.closer_end(pos);
                let end_point = pipe.endpoint(end);
                let near_end = (pos - end_point).length() <= end_region;
                Some(
                    near_end
                        && pipe.connection(end).is_none()
                        && self.endpoint_count(end_point, ENDPOINT_JOIN_TOLERANCE) == 1
                        && !self.has_meter_at(end_point, ENDPOINT_JOIN_TOLERANCE)
                        && !self.has_device_at(end_point, ENDPOINT_JOIN_TOLERANCE),
                )
            });
            updates.push((fitting.id(), visible.unwrap_or(false)));
        }
        for (id, visible) in updates {
            if let Some(Fitting::Valve(v)) = self.fittings.get_mut(&id) {
                v.end_cap_visible = visible;
            }
        }
    }

    /// Split a pipe at an interior point: the original is replaced by two
    /// halves sharing a node at `point`. Valves, fitting connections and
    /// child pipes are reassigned to the geometrically closer half (ties
    /// toward the first half).
    ///
    /// Fails fast when the point is off the segment or coincides with an
    /// endpoint; corner-proximity rejection is the caller's concern
    /// (`SPLIT_CORNER_THRESHOLD`).
    pub fn split_at(&mut self, pipe_id: PipeId, point: DVec3) -> NetworkResult<(PipeId, PipeId)> {
        let old = self
            .pipes
            .get(&pipe_id)
            .ok_or(NetworkError::UnknownPipe(pipe_id))?
            .clone();
        let (_, foot) = old.project(point);
        let off = (point - foot).length();
        if off > SPLIT_ON_SEGMENT_TOLERANCE {
            return Err(NetworkError::SplitOffSegment {
                pipe: pipe_id,
                distance: off,
            });
        }
        if (foot - old.p1).length() < geom::COINCIDENT_EPSILON
            || (foot - old.p2).length() < geom::COINCIDENT_EPSILON
        {
            return Err(NetworkError::SplitAtEndpoint(pipe_id));
        }

        let mut first = Pipe::new(old.p1, foot, old.category, old.floor_id);
        let mut second = Pipe::new(foot, old.p2, old.category, old.floor_id);
        first.color_group = old.color_group;
        second.color_group = old.color_group;
        first.start_connection = old.start_connection;
        second.end_connection = old.end_connection;
        first.end_connection = Some(Connection::pipe(second.id));
        second.start_connection = Some(Connection::pipe(first.id));
        let (first_id, second_id) = (first.id, second.id);

        // Retarget other pipes' connection descriptors to the closer half.
        let other_ids: Vec<PipeId> = self
            .pipe_order
            .iter()
            .copied()
            .filter(|&p| p != pipe_id)
            .collect();
        for pid in other_ids {
            let Some(pipe) = self.pipes.get(&pid) else {
                continue;
            };
            let mut retargets = Vec::new();
            for end in [PipeEnd::Start, PipeEnd::End] {
                if pipe
                    .connection(end)
                    .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == pipe_id)
                {
                    let anchor = pipe.endpoint(end);
                    let target = closer_half(&first, &second, anchor);
                    retargets.push((end, target));
                }
            }
            if let Some(pipe) = self.pipes.get_mut(&pid) {
                for (end, target) in retargets {
                    pipe.set_connection(end, Some(Connection::pipe(target)));
                }
            }
        }

        // Reassign fittings anchored to the old pipe.
        for fid in self.fitting_order.clone() {
            let Some(fitting) = self.fittings.get_mut(&fid) else {
                continue;
            };
            match fitting {
                Fitting::Valve(v) if v.attached_pipe == Some(pipe_id) => {
                    let pos = old.point_at(v.t);
                    let target = closer_half(&first, &second, pos);
                    let half = if target == first_id { &first } else { &second };
                    let (t, _) = half.project(pos);
                    v.attached_pipe = Some(target);
                    v.t = t;
                    if let Some(anchor) = &mut v.anchor {
                        anchor.distance = (pos - half.endpoint(anchor.from_end)).length();
                    }
                }
                Fitting::Meter(m) => {
                    if let Some(inlet) = &mut m.inlet {
                        if inlet.pipe == pipe_id {
                            let anchor = old.endpoint(inlet.end);
                            let target = closer_half(&first, &second, anchor);
                            let half = if target == first_id { &first } else { &second };
                            *inlet = FlexConnection {
                                pipe: target,
                                end: half.closer_end(anchor),
                            };
                        }
                    }
                    if m.outlet_pipe == Some(pipe_id) {
                        let outlet = m.outlet_point();
                        m.outlet_pipe = Some(closer_half(&first, &second, outlet));
                    }
                }
                Fitting::Device(d) => {
                    if let Some(inlet) = &mut d.inlet {
                        if inlet.pipe == pipe_id {
                            let anchor = old.endpoint(inlet.end);
                            let target = closer_half(&first, &second, anchor);
                            let half = if target == first_id { &first } else { &second };
                            *inlet = FlexConnection {
                                pipe: target,
                                end: half.closer_end(anchor),
                            };
                        }
                    }
                }
                Fitting::ServiceBox(s) if s.attached_pipe == Some(pipe_id) => {
                    let outlet = s.outlet_point();
                    s.attached_pipe = Some(closer_half(&first, &second, outlet));
                }
                _ => {}
            }
        }

        // Replace the original in place so labeling order stays stable.
        let idx = self
            .pipe_order
            .iter()
            .position(|&p| p == pipe_id)
            .unwrap_or(self.pipe_order.len());
        self.pipes.remove(&pipe_id);
        self.pipe_order.retain(|&p| p != pipe_id);
        self.pipe_order.insert(idx.min(self.pipe_order.len()), first_id);
        self.pipe_order
            .insert((idx + 1).min(self.pipe_order.len()), second_id);
        self.pipes.insert(first_id, first);
        self.pipes.insert(second_id, second);

        self.refresh_end_caps();
        Ok((first_id, second_id))
    }

    /// Merge the two pipes meeting end-to-start at `point` back into one
    /// straight run (the inverse of a split). Returns the id of the surviving
    /// pipe, or `None` when the elbow is not a straight two-pipe joint or a
    /// fitting occupies it.
    pub fn merge_colinear_at(&mut self, point: DVec3) -> Option<PipeId> {
        let at = self.endpoints_at(point, ENDPOINT_JOIN_TOLERANCE);
        if at.len() != 2 {
            return None;
        }
        // Identify the upstream (terminating) and downstream (starting) pipe.
        let (up, down) = match (at[0], at[1]) {
            ((a, PipeEnd::End), (b, PipeEnd::Start)) => (a, b),
            ((a, PipeEnd::Start), (b, PipeEnd::End)) => (b, a),
            _ => return None,
        };
        if self.has_meter_at(point, ENDPOINT_JOIN_TOLERANCE)
            || self.has_device_at(point, ENDPOINT_JOIN_TOLERANCE)
        {
            return None;
        }
        {
            let up_pipe = self.pipes.get(&up)?;
            let down_pipe = self.pipes.get(&down)?;
            if !down_pipe
                .start_connection
                .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == up)
            {
                return None;
            }
            if !up_pipe.is_colinear_with(down_pipe, MERGE_COLINEAR_TOLERANCE_DEG) {
                return None;
            }
        }

        let down_pipe = self.pipes.get(&down)?.clone();
        {
            let up_pipe = self.pipes.get_mut(&up)?;
            up_pipe.p2 = down_pipe.p2;
            up_pipe.end_connection = down_pipe.end_connection;
        }

        // Move everything referencing the downstream pipe over.
        let up_pipe = self.pipes.get(&up)?.clone();
        for pipe in self.pipes.values_mut() {
            for end in [PipeEnd::Start, PipeEnd::End] {
                if pipe
                    .connection(end)
                    .is_some_and(|c| c.kind == ConnectionKind::Pipe && c.target == down)
                {
                    pipe.set_connection(end, Some(Connection::pipe(up)));
                }
            }
        }
        for fitting in self.fittings.values_mut() {
            match fitting {
                Fitting::Valve(v) if v.attached_pipe == Some(down) => {
                    let pos = down_pipe.point_at(v.t);
                    let (t, _) = up_pipe.project(pos);
                    v.attached_pipe = Some(up);
                    v.t = t;
                    if let Some(anchor) = &mut v.anchor {
                        anchor.distance = (pos - up_pipe.endpoint(anchor.from_end)).length();
                    }
                }
                Fitting::Meter(m) => {
                    if let Some(inlet) = &mut m.inlet {
                        if inlet.pipe == down {
                            inlet.pipe = up;
                        }
                    }
                    if m.outlet_pipe == Some(down) {
                        m.outlet_pipe = Some(up);
                    }
                }
                Fitting::Device(d) => {
                    if let Some(inlet) = &mut d.inlet {
                        if inlet.pipe == down {
                            inlet.pipe = up;
                        }
                    }
                }
                Fitting::ServiceBox(s) if s.attached_pipe == Some(down) => {
                    s.attached_pipe = Some(up);
                }
                _ => {}
            }
        }

        self.pipes.remove(&down);
        self.pipe_order.retain(|&p| p != down);
        self.refresh_end_caps();
        Some(up)
    }
}

/// Which half a point belongs to after a split: the one whose segment the
/// point projects closer onto, ties toward the first.
fn closer_half(first: &Pipe, second: &Pipe, point: DVec3) -> PipeId {
    let (_, foot1) = first.project(point);
    let (_, foot2) = second.project(point);
    if (point - foot1).length() <= (point - foot2).length() {
        first.id
    } else {
        second.id
    }
}

/// Look up a fitting expecting a specific variant; fail fast otherwise.
pub(crate) fn expect_variant<'a, T>(
    network: &'a PipeNetwork,
    id: FittingId,
    expected: &'static str,
    extract: impl Fn(&'a Fitting) -> Option<&'a T>,
) -> NetworkResult<&'a T> {
    let fitting = network
        .fitting(id)
        .ok_or(NetworkError::UnknownFitting(id))?;
    extract(fitting).ok_or(NetworkError::WrongVariant {
        id,
        expected,
        actual: fitting.variant_name(),
    })
}
