// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! View models - Data structures prepared for UI display

use crate::state::{AppCore, ConnectionState};

/// One entry of the cores list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreEntry {
    pub platform: String,
    pub name: String,
}

impl CoreEntry {
    /// `[platform] name`
    pub fn label(&self) -> String {
        format!("[{}] {}", self.platform, self.name)
    }
}

/// Enabled state and labels of every control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsViewModel {
    pub connect_label: &'static str,
    pub connect_enabled: bool,
    pub host_editable: bool,
    /// Emulator, debug, cores and memory groups
    pub groups_enabled: bool,
    pub cores_list_enabled: bool,
    /// Core info and load core
    pub core_buttons_enabled: bool,
    pub read_enabled: bool,
    pub write_enabled: bool,
    pub read_write_test_enabled: bool,
    pub status_message: String,
    pub emulator_label: String,
    pub core_labels: Vec<String>,
}

impl ControlsViewModel {
    pub fn from_core(core: &AppCore) -> Self {
        let connected = core.connection == ConnectionState::Connected;
        Self {
            connect_label: if connected { "Disconnect" } else { "Connect" },
            connect_enabled: matches!(
                core.connection,
                ConnectionState::Connected | ConnectionState::Disconnected
            ),
            host_editable: core.connection == ConnectionState::Disconnected,
            groups_enabled: connected,
            cores_list_enabled: connected && !core.cores_list_busy,
            core_buttons_enabled: connected && core.selected_core.is_some(),
            read_enabled: connected && !core.read_memories.is_empty(),
            write_enabled: connected && !core.write_memories.is_empty(),
            read_write_test_enabled: connected && core.read_write_test_available,
            status_message: core.status_message.clone(),
            emulator_label: core.emulator_label.clone(),
            core_labels: core.cores.iter().map(CoreEntry::label).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_label() {
        let entry = CoreEntry {
            platform: "SNES".into(),
            name: "snes9x".into(),
        };
        assert_eq!(entry.label(), "[SNES] snes9x");
    }

    #[test]
    fn test_disconnected_controls() {
        let vm = ControlsViewModel::from_core(&AppCore::new());
        assert_eq!(vm.connect_label, "Connect");
        assert!(vm.connect_enabled);
        assert!(vm.host_editable);
        assert!(!vm.groups_enabled);
        assert!(!vm.read_enabled);
        assert_eq!(vm.status_message, "Disconnected");
    }

    #[test]
    fn test_connected_controls() {
        let mut core = AppCore::new();
        core.on_connected();
        let vm = ControlsViewModel::from_core(&core);
        assert_eq!(vm.connect_label, "Disconnect");
        assert!(!vm.host_editable);
        assert!(vm.groups_enabled);
        assert!(vm.cores_list_enabled);
        assert!(!vm.core_buttons_enabled);
        assert!(!vm.write_enabled);

        core.cores.push(CoreEntry {
            platform: "GB".into(),
            name: "gambatte".into(),
        });
        core.select_core(Some(0));
        core.read_memories.push("WRAM".into());
        core.cores_list_busy = true;
        let vm = ControlsViewModel::from_core(&core);
        assert!(vm.core_buttons_enabled);
        assert!(vm.read_enabled);
        assert!(!vm.cores_list_enabled);
        assert_eq!(vm.core_labels, vec!["[GB] gambatte"]);
    }

    #[test]
    fn test_connecting_disables_connect_button() {
        let mut core = AppCore::new();
        core.begin_connect();
        let vm = ControlsViewModel::from_core(&core);
        assert!(!vm.connect_enabled);
        assert!(!vm.host_editable);
    }
}
