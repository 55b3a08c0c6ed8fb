//! Full-snapshot undo/redo. The mutation rate is one structural change per
//! user action, so deep-clone snapshots in a bounded ring are kept instead
//! of an operation log.

use crate::draw::DrawSession;
use crate::interact::InteractionState;
use crate::network::PipeNetwork;
use serde::{Deserialize, Serialize};

/// Maximum number of undo states to keep.
const MAX_UNDO_HISTORY: usize = 50;

/// A serializable snapshot of the whole network, plus the in-progress draw
/// session if one was active when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub network: PipeNetwork,
    #[serde(default)]
    pub draw: Option<DrawSession>,
}

impl NetworkSnapshot {
    pub fn capture(network: &PipeNetwork, state: &InteractionState) -> Self {
        Self {
            network: network.clone(),
            draw: state.draw.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Undo/redo stacks of network snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<NetworkSnapshot>,
    redo_stack: Vec<NetworkSnapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state (call immediately before a committed
    /// structural mutation).
    pub fn push_undo(&mut self, network: &PipeNetwork, state: &InteractionState) {
        self.undo_stack.push(NetworkSnapshot::capture(network, state));

        // New changes invalidate the redo branch.
        self.redo_stack.clear();

        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the last change. Returns true if a snapshot was restored.
    /// Restoring never resumes an in-flight interaction: the interaction
    /// state always comes back neutral.
    pub fn undo(&mut self, network: &mut PipeNetwork, state: &mut InteractionState) -> bool {
        if let Some(snapshot) = self.undo_stack.pop() {
            self.redo_stack
                .push(NetworkSnapshot::capture(network, state));
            restore(snapshot, network, state);
            true
        } else {
            false
        }
    }

    /// Redo the last undone change. Returns true if a snapshot was restored.
    pub fn redo(&mut self, network: &mut PipeNetwork, state: &mut InteractionState) -> bool {
        if let Some(snapshot) = self.redo_stack.pop() {
            self.undo_stack
                .push(NetworkSnapshot::capture(network, state));
            restore(snapshot, network, state);
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

fn restore(snapshot: NetworkSnapshot, network: &mut PipeNetwork, state: &mut InteractionState) {
    *network = snapshot.network;
    state.reset();
}
