// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Controller session
//!
//! Owns one [`EmuClient`] and one [`AppCore`]. User actions become command
//! sequences, replies are rendered into the state and every change is
//! reported to the [`EmuEventHandler`]. All of it runs on the task that
//! calls [`Session::run`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use emunwa_common::{
    parse_hex, parse_regions, ClientConfig, ClientEvent, Command, EmuClient, Error,
};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::{Action, EmuEventHandler, GuiEvent};
use crate::selftest;
use crate::state::AppCore;

pub struct Session {
    pub(crate) client: EmuClient,
    pub(crate) core: AppCore,
    handler: Arc<dyn EmuEventHandler>,
    /// Status poll, running only while connected
    poll: Option<Interval>,
    /// Replies still to be rendered for commands this session sent
    awaiting: usize,
}

impl Session {
    pub fn new(config: ClientConfig, handler: Arc<dyn EmuEventHandler>) -> Self {
        Self {
            client: EmuClient::new(config),
            core: AppCore::new(),
            handler,
            poll: None,
            awaiting: 0,
        }
    }

    pub fn core(&self) -> &AppCore {
        &self.core
    }

    pub fn client(&self) -> &EmuClient {
        &self.client
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// Process actions, replies and poll ticks until `Quit` or the sender is dropped
    pub async fn run(&mut self, mut actions: mpsc::UnboundedReceiver<Action>) -> Result<()> {
        self.emit([GuiEvent::StatusMessage(self.core.status_message.clone())]);

        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    None | Some(Action::Quit) => break,
                    Some(action) => self.dispatch(action).await,
                },

                Some(event) = self.client.next_event() => {
                    self.handle_client_event(event);
                }

                _ = next_tick(&mut self.poll) => {
                    self.poll_status().await;
                }
            }
        }

        if self.client.is_connected() {
            self.client.disconnect_from_host().await;
        }
        info!("Session ended");
        Ok(())
    }

    /// Perform one user action
    pub async fn dispatch(&mut self, action: Action) {
        debug!("Action: {:?}", action);
        match action {
            Action::ToggleConnection { host } => self.toggle_connection(&host).await,
            Action::EmuInfo => {
                self.send_all([Command::emu_info(), Command::emu_status()])
                    .await
            }
            Action::LoadGame(path) => {
                if !path.trim().is_empty() {
                    self.send_all([
                        Command::load_game(&path),
                        Command::emu_status(),
                        Command::game_info(),
                    ])
                    .await
                }
            }
            Action::EmuReset => self.send_with_status(Command::emu_reset()).await,
            Action::EmuStop => self.send_with_status(Command::emu_stop()).await,
            Action::EmuPause => self.send_with_status(Command::emu_pause()).await,
            Action::EmuResume => self.send_with_status(Command::emu_resume()).await,
            Action::EmuReload => self.send_with_status(Command::emu_reload()).await,
            Action::DebugBreak => self.send_with_status(Command::debug_break()).await,
            Action::DebugContinue => self.send_with_status(Command::debug_continue()).await,
            Action::CoresList => {
                self.core.cores_list_busy = true;
                self.send_all([Command::cores_list(None)]).await;
            }
            Action::SelectCore(index) => {
                self.core.select_core(index);
                self.view_changed();
            }
            Action::CoreInfo => {
                let core = self.selected_core();
                self.send_all([Command::core_info(&core)]).await;
            }
            Action::LoadCore => {
                let core = self.selected_core();
                self.core.clear_memories();
                self.send_all([Command::load_core(&core), Command::core_memories()])
                    .await;
            }
            Action::UnloadCore => {
                self.core.clear_memories();
                self.send_all([Command::load_core(""), Command::core_memories()])
                    .await;
            }
            Action::CoreCurrentInfo => self.send_all([Command::core_current_info()]).await,
            Action::CoreReset => {
                self.send_all([
                    Command::core_reset(),
                    Command::emu_status(),
                    Command::game_info(),
                ])
                .await
            }
            Action::Write {
                memory,
                addresses,
                data,
            } => match write_command(&memory, &addresses, &data) {
                Ok(command) => self.send_all([command]).await,
                Err(e) => self.emit([GuiEvent::ShowError(format!("{:#}", e))]),
            },
            Action::Read { memory, addresses } => match read_command(&memory, &addresses) {
                Ok(command) => self.send_all([command]).await,
                Err(e) => self.emit([GuiEvent::ShowError(format!("{:#}", e))]),
            },
            Action::SetAppendReads(append) => {
                self.core.append_reads = append;
                self.view_changed();
            }
            Action::ClearReadout => {
                self.core.set_readout("");
                self.view_changed();
            }
            Action::ReadWriteTest => {
                let event = match selftest::run(self).await {
                    Ok(outcome) => outcome.to_event(),
                    Err(e) => GuiEvent::ShowError(format!("{:#}", e)),
                };
                self.emit([event]);
            }
            Action::Quit => {}
        }
    }

    /// Render a client event into the state
    pub fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Reply(reply) => {
                self.awaiting = self.awaiting.saturating_sub(1);
                let events = self.core.apply_reply(&reply);
                self.emit(events);
            }
            ClientEvent::Disconnected { error } => self.connection_lost(error.as_deref()),
        }
    }

    /// One status poll: `EMU_STATUS`, `GAME_INFO`
    pub async fn poll_status(&mut self) {
        if self.client.is_connected() {
            self.send_all([Command::emu_status(), Command::game_info()])
                .await;
        }
    }

    /// Render replies until every command sent so far has been answered
    pub async fn drain(&mut self, limit: Duration) -> Result<()> {
        let deadline = Instant::now() + limit;
        while self.awaiting > 0 {
            let event = tokio::time::timeout_at(deadline, self.client.next_event())
                .await
                .with_context(|| format!("Timed out waiting for {} replies", self.awaiting))?;
            match event {
                Some(event) => self.handle_client_event(event),
                None => break,
            }
        }
        Ok(())
    }

    /// Send commands in order; a failed send ends the connection
    pub(crate) async fn send_all(&mut self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            let kind = command.kind;
            match self.client.send(command).await {
                Ok(()) => self.awaiting += 1,
                Err(Error::NotConnected) => {
                    warn!("Not connected, dropping {}", kind);
                    return;
                }
                Err(e) if self.client.is_connected() => {
                    warn!("Rejected {}: {}", kind, e);
                    self.emit([GuiEvent::ShowError(e.to_string())]);
                }
                Err(e) => {
                    warn!("Sending {} failed: {}", kind, e);
                    let error = self
                        .client
                        .error()
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string());
                    self.connection_lost(Some(&error));
                    return;
                }
            }
        }
    }

    async fn send_with_status(&mut self, command: Command) {
        self.send_all([command, Command::emu_status()]).await;
    }

    async fn toggle_connection(&mut self, host: &str) {
        if self.client.is_connected() {
            let event = self.core.begin_disconnect();
            self.emit([event]);
            self.client.disconnect_from_host().await;
            self.connection_lost(None);
            return;
        }

        let event = self.core.begin_connect();
        self.emit([event]);

        let port = self.client.config().port;
        match self.client.connect_to_host(host, port).await {
            Ok(()) => {
                let event = self.core.on_connected();
                self.emit([event]);
                self.awaiting = 0;

                let mut commands = Vec::new();
                let name = self.client.config().client_name.clone();
                if !name.is_empty() {
                    commands.push(Command::my_name_is(&name));
                }
                commands.extend([
                    Command::emu_info(),
                    Command::cores_list(None),
                    Command::core_memories(),
                ]);
                self.send_all(commands).await;
                self.start_poll();
            }
            Err(e) => {
                let error = self
                    .client
                    .error()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                let event = self.core.on_connect_error(&error);
                self.emit([event]);
            }
        }
    }

    fn connection_lost(&mut self, error: Option<&str>) {
        self.poll = None;
        self.awaiting = 0;
        let event = self.core.on_disconnected(error);
        self.emit([event]);
    }

    fn start_poll(&mut self) {
        if !self.client.is_connected() {
            return;
        }
        let period = self.client.config().poll_interval();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll = Some(interval);
    }

    fn selected_core(&self) -> String {
        self.core.selected_core_name().unwrap_or_default().to_string()
    }

    fn emit(&self, events: impl IntoIterator<Item = GuiEvent>) {
        for event in events {
            event.dispatch(self.handler.as_ref());
        }
        self.view_changed();
    }

    fn view_changed(&self) {
        self.handler.on_view_changed(&self.core);
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn write_command(memory: &str, addresses: &str, data: &str) -> Result<Command> {
    let regions = parse_regions(addresses).context("Invalid address list")?;
    let bytes = parse_hex(data).context("Invalid write data")?;
    Ok(Command::core_write(memory, &regions, bytes))
}

fn read_command(memory: &str, addresses: &str) -> Result<Command> {
    let regions = parse_regions(addresses).context("Invalid address list")?;
    Ok(Command::core_read(memory, &regions))
}
