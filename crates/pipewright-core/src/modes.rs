//! Editor mode signaling. The core never owns UI state; it requests mode
//! transitions through a narrow callback trait the host implements.

/// UI modes the core can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    /// Selection/manipulation of existing topology.
    #[default]
    Select,
    /// Appending pipe segments via a draw session.
    DrawPipe,
}

/// Host-side sink for mode transition requests.
pub trait ModeDispatcher {
    fn request_mode(&mut self, mode: EditorMode);
}

/// Dispatcher that ignores every request; used in tests and headless runs.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl ModeDispatcher for NullDispatcher {
    fn request_mode(&mut self, _mode: EditorMode) {}
}

/// Dispatcher that records requests for inspection.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub requests: Vec<EditorMode>,
}

impl ModeDispatcher for RecordingDispatcher {
    fn request_mode(&mut self, mode: EditorMode) {
        self.requests.push(mode);
    }
}
