// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Framework-agnostic application state

use emunwa_common::{format_hex_dump, CommandKind, Reply, ReplyBody};
use tracing::debug;

use crate::events::GuiEvent;
use crate::view_models::CoreEntry;

/// Connection phase as shown by the connect button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Core application state (framework-agnostic)
///
/// Mirrors the latest replies from the emulator. Widgets are owned by the
/// front end and rebuilt from this through
/// [`ControlsViewModel`](crate::view_models::ControlsViewModel).
#[derive(Debug, Clone)]
pub struct AppCore {
    pub connection: ConnectionState,

    /// Status line text
    pub status_message: String,

    /// Joined `EMU_INFO` reply
    pub emulator_label: String,

    pub cores: Vec<CoreEntry>,
    pub selected_core: Option<usize>,

    /// Set while a `CORES_LIST` request is outstanding
    pub cores_list_busy: bool,

    pub read_memories: Vec<String>,
    pub write_memories: Vec<String>,

    /// A writable `WRAM` is available
    pub read_write_test_available: bool,

    /// Memory dumps and unrecognized replies
    pub readout: String,

    /// Append binary dumps to the readout instead of replacing it
    pub append_reads: bool,

    pub last_emu_state: String,
    pub last_game_info: String,
}

impl Default for AppCore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppCore {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            status_message: "Disconnected".to_string(),
            emulator_label: String::new(),
            cores: Vec::new(),
            selected_core: None,
            cores_list_busy: false,
            read_memories: Vec::new(),
            write_memories: Vec::new(),
            read_write_test_available: false,
            readout: String::new(),
            append_reads: false,
            last_emu_state: String::new(),
            last_game_info: String::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Replace the status line
    pub fn set_status(&mut self, message: impl Into<String>) -> GuiEvent {
        self.status_message = message.into();
        GuiEvent::StatusMessage(self.status_message.clone())
    }

    pub fn begin_connect(&mut self) -> GuiEvent {
        self.connection = ConnectionState::Connecting;
        self.set_status("Connecting ...")
    }

    pub fn begin_disconnect(&mut self) -> GuiEvent {
        self.connection = ConnectionState::Disconnecting;
        self.set_status("Disconnecting ...")
    }

    pub fn on_connected(&mut self) -> GuiEvent {
        self.connection = ConnectionState::Connected;
        self.clear_memories();
        self.cores_list_busy = false;
        self.set_status("Connected")
    }

    /// Connection ended, locally (`None`) or with an error
    pub fn on_disconnected(&mut self, error: Option<&str>) -> GuiEvent {
        self.connection = ConnectionState::Disconnected;
        self.cores.clear();
        self.selected_core = None;
        self.cores_list_busy = false;
        self.clear_memories();
        self.emulator_label.clear();
        self.last_emu_state.clear();
        self.last_game_info.clear();

        match error.filter(|e| !e.is_empty()) {
            Some(error) => self.set_status(format!("Disconnected: {}", error)),
            None => self.set_status("Disconnected"),
        }
    }

    pub fn on_connect_error(&mut self, error: &str) -> GuiEvent {
        self.on_disconnected(None);
        self.set_status(format!("Error: {}", error))
    }

    /// Select a cores list entry; out-of-range indexes clear the selection
    pub fn select_core(&mut self, index: Option<usize>) {
        self.selected_core = index.filter(|&i| i < self.cores.len());
    }

    pub fn selected_core_name(&self) -> Option<&str> {
        self.selected_core
            .and_then(|i| self.cores.get(i))
            .map(|c| c.name.as_str())
    }

    /// Empty both memory lists and disable the read/write test
    pub fn clear_memories(&mut self) {
        self.read_memories.clear();
        self.write_memories.clear();
        self.read_write_test_available = false;
    }

    /// Add a paragraph to the readout
    pub fn append_readout(&mut self, text: &str) {
        if !self.readout.is_empty() {
            self.readout.push('\n');
        }
        self.readout.push_str(text);
    }

    pub fn set_readout(&mut self, text: impl Into<String>) {
        self.readout = text.into();
    }

    /// Render a reply into the view state
    pub fn apply_reply(&mut self, reply: &Reply) -> Vec<GuiEvent> {
        let mut events = Vec::new();

        if reply.is(CommandKind::CoresList) {
            self.cores_list_busy = false;
        }

        // OK replies to simple commands carry nothing to show
        if !reply.is_error() && reply.command.is_some_and(|k| k.is_simple()) {
            return events;
        }

        let ok_ascii = reply.is_ascii();
        let mut state_changed = false;

        match reply.command {
            Some(CommandKind::CoresList) if ok_ascii => {
                self.cores = reply
                    .to_map_list()
                    .into_iter()
                    .filter_map(|mut map| {
                        let name = map.remove("name")?;
                        Some(CoreEntry {
                            platform: map.remove("platform").unwrap_or_default(),
                            name,
                        })
                    })
                    .collect();
                self.selected_core = None;
            }
            Some(CommandKind::EmuInfo) if ok_ascii => {
                self.emulator_label = reply.ascii().join(", ");
            }
            Some(CommandKind::EmuStatus) if ok_ascii => {
                let new_state = reply.to_map().remove("state").unwrap_or_default();
                if new_state != self.last_emu_state {
                    self.last_emu_state = new_state;
                    state_changed = true;
                }
            }
            Some(CommandKind::GameInfo) if ok_ascii => {
                let mut map = reply.to_map();
                let mut new_info = map.remove("name").unwrap_or_default();
                if let Some(region) = map.remove("region") {
                    new_info.push_str(&format!(" [{}]", region));
                }
                if new_info != self.last_game_info {
                    self.last_game_info = new_info;
                    state_changed = true;
                }
            }
            Some(CommandKind::CoreMemories) if ok_ascii => {
                self.clear_memories();
                for map in reply.to_map_list() {
                    let Some(name) = map.get("name") else {
                        continue;
                    };
                    let access = map.get("access").map(String::as_str).unwrap_or("rw");
                    if access.contains('r') {
                        self.read_memories.push(name.clone());
                    }
                    if access.contains('w') {
                        self.write_memories.push(name.clone());
                        if name == "WRAM" {
                            self.read_write_test_available = true;
                        }
                    }
                }
            }
            _ => match &reply.body {
                ReplyBody::Binary(data) => {
                    let dump = format_hex_dump(data);
                    if self.append_reads {
                        self.append_readout(&dump);
                    } else {
                        self.set_readout(dump);
                    }
                }
                ReplyBody::Ascii(lines) => self.set_readout(lines.join("\n")),
                ReplyBody::Error { .. } => {
                    let message = reply.error_message().unwrap_or_default();
                    debug!("Error reply to {:?}: {}", reply.command, message);
                    events.push(GuiEvent::ShowError(message));
                }
            },
        }

        if state_changed {
            let mut status = format!("State: {}", self.last_emu_state);
            if !self.last_game_info.is_empty() {
                status.push_str(&format!(", Game: {}", self.last_game_info));
            }
            events.push(self.set_status(status));
        }

        events
    }
}
