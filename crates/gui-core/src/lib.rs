// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Framework-agnostic controller core for emulator network access front ends
//!
//! This crate holds the view state, the action-to-command mapping and the
//! reply rendering shared by every front end.

pub mod events;
pub mod selftest;
pub mod session;
pub mod state;
pub mod view_models;

// Re-export commonly used types
pub use events::{Action, EmuEventHandler, GuiEvent};
pub use selftest::{SelfTestOutcome, EXPECTED_READOUT};
pub use session::Session;
pub use state::{AppCore, ConnectionState};
pub use view_models::{ControlsViewModel, CoreEntry};

// Re-export types from common crate for convenience
pub use emunwa_common::{ClientConfig, CommandKind, Reply};
