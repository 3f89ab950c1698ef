// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Memory read/write self-test
//!
//! Exercises single, multi-region and end-of-memory reads and writes on
//! `WRAM` and compares the rendered readout with a known transcript.
//! Offset 0x231C is where Secret of Evermore keeps the call bead count.

use anyhow::Result;
use emunwa_common::{Address, Command, MemoryRegion};
use tracing::{info, warn};

use crate::events::GuiEvent;
use crate::session::Session;

pub const TEST_MEMORY: &str = "WRAM";

const BASE: u32 = 0x231c;
const LAST: u32 = 0x1ffff;

/// Readout produced by a passing run
pub const EXPECTED_READOUT: &str = "01\n02 00 02\n03 00 03\n00\n01\n00\naa\naa 00 00 aa";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfTestOutcome {
    Passed,
    Failed { readout: String },
    /// Not connected, or the connection dropped during the run
    NotConnected,
}

impl SelfTestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, SelfTestOutcome::Passed)
    }

    pub fn to_event(&self) -> GuiEvent {
        match self {
            SelfTestOutcome::Passed => GuiEvent::ShowSuccess("Read/write tests succeeded!".to_string()),
            SelfTestOutcome::Failed { .. } => GuiEvent::ShowError(
                "Tests failed. Did you load a compatible ROM?".to_string(),
            ),
            SelfTestOutcome::NotConnected => {
                GuiEvent::ShowError("Read/write tests need a connected emulator".to_string())
            }
        }
    }
}

fn from(offset: u32) -> MemoryRegion {
    MemoryRegion::new(Some(Address::Start(offset)), None)
}

/// The command burst, in send order
pub fn commands() -> Vec<Command> {
    let at = MemoryRegion::at;
    let mem = TEST_MEMORY;
    vec![
        // single write, single read
        Command::core_write(mem, &[from(BASE)], vec![0x01, 0x00]),
        Command::core_read(mem, &[at(BASE, 1)]),
        // chunks are written in the order given
        Command::core_write(mem, &[at(BASE, 1), at(BASE - 1, 2)], vec![0x63, 0x00, 0x02]),
        Command::core_read(mem, &[at(BASE, 1), at(BASE - 1, 2)]),
        // one block over several regions
        Command::core_write(mem, &[at(BASE, 1), at(BASE - 1, 3)], vec![0x63, 0x00, 0x03, 0x00]),
        Command::core_read(mem, &[at(BASE, 1), at(BASE - 1, 2)]),
        // from the start
        Command::core_write(mem, &[], vec![0x00]),
        Command::core_read(mem, &[at(0, 1)]),
        Command::core_write(mem, &[], vec![0x01]),
        Command::core_read(mem, &[MemoryRegion::new(None, Some(1))]),
        // up to the end
        Command::core_write(mem, &[from(LAST)], vec![0x00]),
        Command::core_read(mem, &[at(LAST, 1)]),
        Command::core_write(mem, &[from(LAST)], vec![0xaa, 0x77]),
        Command::core_read(mem, &[from(LAST)]),
        // padding between regions
        Command::core_read(mem, &[at(LAST, 3), at(LAST, 3)]),
    ]
}

/// Run the test on a connected session
///
/// The readout is cleared and append mode forced on for the run; the previous
/// append mode is restored afterwards.
pub async fn run(session: &mut Session) -> Result<SelfTestOutcome> {
    if !session.client.is_connected() {
        return Ok(SelfTestOutcome::NotConnected);
    }

    let old_append = session.core.append_reads;
    session.core.set_readout("");
    session.core.append_reads = true;

    session.send_all(commands()).await;
    let reply_timeout = session.client.config().reply_timeout();
    let drained = session.drain(reply_timeout).await;
    session.core.append_reads = old_append;
    drained?;

    if !session.client.is_connected() {
        warn!("Connection lost during read/write test");
        return Ok(SelfTestOutcome::NotConnected);
    }

    if session.core.readout == EXPECTED_READOUT {
        info!("Read/write test passed");
        Ok(SelfTestOutcome::Passed)
    } else {
        warn!("Read/write test failed, readout: {:?}", session.core.readout);
        Ok(SelfTestOutcome::Failed {
            readout: session.core.readout.clone(),
        })
    }
}
