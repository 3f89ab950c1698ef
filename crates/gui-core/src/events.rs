// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Event handling traits and types

use crate::state::AppCore;

/// Framework-agnostic event handler trait
///
/// Front ends implement this trait to mirror the controller state in
/// their widgets.
pub trait EmuEventHandler: Send + Sync {
    /// Called when the status line text changes
    fn on_status_message(&self, message: &str);

    /// Called when the emulator answers with an error
    fn on_error(&self, error: &str);

    /// Called when an operation finished successfully (e.g. the self-test)
    fn on_success(&self, message: &str);

    /// Called after any change to the view state
    fn on_view_changed(&self, core: &AppCore);
}

/// Something the front end should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiEvent {
    /// Replace the status line
    StatusMessage(String),

    /// Show error message
    ShowError(String),

    /// Show success message
    ShowSuccess(String),
}

impl GuiEvent {
    /// Forward to the matching handler method
    pub fn dispatch(&self, handler: &dyn EmuEventHandler) {
        match self {
            GuiEvent::StatusMessage(message) => handler.on_status_message(message),
            GuiEvent::ShowError(error) => handler.on_error(error),
            GuiEvent::ShowSuccess(message) => handler.on_success(message),
        }
    }
}

/// User actions a front end can trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Connect to `host`, or disconnect when already connected
    ToggleConnection { host: String },
    EmuInfo,
    /// Load a game file; an empty path is ignored
    LoadGame(String),
    EmuReset,
    EmuStop,
    EmuPause,
    EmuResume,
    EmuReload,
    DebugBreak,
    DebugContinue,
    CoresList,
    /// Select an entry of the cores list
    SelectCore(Option<usize>),
    CoreInfo,
    LoadCore,
    UnloadCore,
    CoreCurrentInfo,
    CoreReset,
    /// Write hex `data` into `memory` at the regions in `addresses`
    Write {
        memory: String,
        addresses: String,
        data: String,
    },
    Read {
        memory: String,
        addresses: String,
    },
    SetAppendReads(bool),
    ClearReadout,
    ReadWriteTest,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl EmuEventHandler for Recorder {
        fn on_status_message(&self, message: &str) {
            self.calls.lock().unwrap().push(format!("status {}", message));
        }
        fn on_error(&self, error: &str) {
            self.calls.lock().unwrap().push(format!("error {}", error));
        }
        fn on_success(&self, message: &str) {
            self.calls.lock().unwrap().push(format!("success {}", message));
        }
        fn on_view_changed(&self, _core: &AppCore) {}
    }

    #[test]
    fn test_dispatch() {
        let recorder = Recorder::default();
        GuiEvent::StatusMessage("Connected".into()).dispatch(&recorder);
        GuiEvent::ShowError("Unknown memory".into()).dispatch(&recorder);
        GuiEvent::ShowSuccess("done".into()).dispatch(&recorder);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["status Connected", "error Unknown memory", "success done"]
        );
    }
}
