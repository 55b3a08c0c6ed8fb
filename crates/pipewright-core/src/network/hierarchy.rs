//! Derived hierarchy labeling of the network.
//!
//! A breadth-first traversal from each root (service-box outlet pipes, meter
//! outlet pipes) assigns sequential labels A, B, C, … to pipes. The labels
//! drive navigation and the "smart parent" choice when a new branch starts at
//! a point shared by several pipes.

use super::{Fitting, PipeEnd, PipeId, PipeNetwork};
use glam::DVec3;
use std::collections::{HashMap, HashSet, VecDeque};

/// Search radius for smart parent selection.
pub const SMART_PARENT_RADIUS: f64 = 2.0;

/// Hierarchy record of a single pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEntry {
    /// Sequential label (A, B, …, Z, AA, …).
    pub label: String,
    /// Label of the parent pipe, if any.
    pub parent: Option<String>,
    /// Labels of the child pipes, in assignment order.
    pub children: Vec<String>,
}

/// The derived hierarchy labeling of a network.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    entries: HashMap<PipeId, HierarchyEntry>,
    /// Pipes in label assignment order.
    order: Vec<PipeId>,
}

impl Hierarchy {
    /// Label of a pipe, if it was reached by the traversal.
    pub fn label(&self, pipe: PipeId) -> Option<&str> {
        self.entries.get(&pipe).map(|e| e.label.as_str())
    }

    /// Full entry of a pipe.
    pub fn entry(&self, pipe: PipeId) -> Option<&HierarchyEntry> {
        self.entries.get(&pipe)
    }

    /// Labeled pipes in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (PipeId, &HierarchyEntry)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (*id, e)))
    }

    /// Position of a pipe in assignment order (lower = more upstream).
    pub fn rank(&self, pipe: PipeId) -> Option<usize> {
        self.order.iter().position(|&p| p == pipe)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Spreadsheet-style label for a sequential index: A, B, …, Z, AA, AB, ….
pub fn label_for_index(mut index: usize) -> String {
    let mut label = String::new();
    loop {
        label.insert(0, (b'A' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    label
}

impl PipeNetwork {
    /// Roots of the hierarchy traversal: pipes attached to a service box or
    /// leaving a meter outlet (in fitting order), then any remaining pipe
    /// without an upstream connection (in pipe order).
    fn hierarchy_roots(&self) -> Vec<PipeId> {
        let mut roots = Vec::new();
        for fitting in self.fittings() {
            match fitting {
                Fitting::ServiceBox(s) => {
                    if let Some(pipe) = s.attached_pipe {
                        if self.pipe(pipe).is_some() && !roots.contains(&pipe) {
                            roots.push(pipe);
                        }
                    }
                }
                Fitting::Meter(m) => {
                    if let Some(pipe) = m.outlet_pipe {
                        if self.pipe(pipe).is_some() && !roots.contains(&pipe) {
                            roots.push(pipe);
                        }
                    }
                }
                _ => {}
            }
        }
        for pipe in self.pipes() {
            if pipe.start_connection.is_none() && !roots.contains(&pipe.id) {
                roots.push(pipe.id);
            }
        }
        roots
    }

    /// Compute the hierarchy labeling. Deterministic for a fixed network:
    /// traversal order depends only on fitting/pipe insertion order.
    pub fn hierarchy(&self) -> Hierarchy {
        let mut entries: HashMap<PipeId, HierarchyEntry> = HashMap::new();
        let mut order = Vec::new();
        let mut parents: HashMap<PipeId, PipeId> = HashMap::new();
        let mut visited: HashSet<PipeId> = HashSet::new();
        let mut queue: VecDeque<PipeId> = VecDeque::new();

        for root in self.hierarchy_roots() {
            if visited.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(pipe_id) = queue.pop_front() {
            let label = label_for_index(order.len());
            order.push(pipe_id);
            entries.insert(
                pipe_id,
                HierarchyEntry {
                    label,
                    parent: None,
                    children: Vec::new(),
                },
            );
            for child in self.children_of(pipe_id) {
                if visited.insert(child) {
                    parents.insert(child, pipe_id);
                    queue.push_back(child);
                }
            }
        }

        // Fill parent/child labels now that every label is assigned.
        for (&child, &parent) in &parents {
            let parent_label = entries.get(&parent).map(|e| e.label.clone());
            let child_label = entries.get(&child).map(|e| e.label.clone());
            if let (Some(parent_label), Some(child_label)) = (parent_label, child_label) {
                if let Some(entry) = entries.get_mut(&child) {
                    entry.parent = Some(parent_label);
                }
                if let Some(entry) = entries.get_mut(&parent) {
                    entry.children.push(child_label);
                }
            }
        }
        for entry in entries.values_mut() {
            entry.children.sort();
        }

        Hierarchy { entries, order }
    }

    /// Pick the topologically-correct parent pipe for a branch starting at
    /// `point`. Pipes that terminate *into* the point (their end lands within
    /// `SMART_PARENT_RADIUS`) are preferred over pipes that merely start
    /// there; remaining ambiguity is broken by hierarchy rank (most upstream
    /// first), then insertion order.
    pub fn smart_parent_at(&self, point: DVec3) -> Option<PipeId> {
        let touching = self.endpoints_at(point, SMART_PARENT_RADIUS);
        if touching.is_empty() {
            return None;
        }
        let hierarchy = self.hierarchy();
        let rank = |id: PipeId| {
            hierarchy
                .rank(id)
                .or_else(|| self.pipe_index(id).map(|i| usize::MAX / 2 + i))
                .unwrap_or(usize::MAX)
        };

        let mut terminating: Vec<PipeId> = touching
            .iter()
            .filter(|(_, end)| *end == PipeEnd::End)
            .map(|(id, _)| *id)
            .collect();
        terminating.sort_by_key(|&id| rank(id));
        if let Some(&best) = terminating.first() {
            return Some(best);
        }

        let mut starting: Vec<PipeId> = touching.iter().map(|(id, _)| *id).collect();
        starting.sort_by_key(|&id| rank(id));
        starting.first().copied()
    }
}
