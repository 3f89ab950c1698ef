// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! In-memory emulator state and command execution

use std::path::Path;

use emunwa_common::{
    parse_memory_args, CommandKind, ErrorKind, MemoryRegion, ReplyFrame, Request, MAX_BINARY_LEN,
};
use tracing::debug;

/// A memory exposed by a core
#[derive(Debug, Clone)]
pub struct MemorySpec {
    pub name: &'static str,
    pub size: usize,
    /// `r`, `w` or `rw`
    pub access: &'static str,
}

/// A core the mock can load
#[derive(Debug, Clone)]
pub struct CoreSpec {
    pub name: &'static str,
    pub platform: &'static str,
    pub version: &'static str,
    pub memories: Vec<MemorySpec>,
}

/// Cores offered by default
pub fn default_cores() -> Vec<CoreSpec> {
    vec![
        CoreSpec {
            name: "snes9x",
            platform: "SNES",
            version: "1.62",
            memories: vec![
                MemorySpec { name: "WRAM", size: 0x20000, access: "rw" },
                MemorySpec { name: "SRAM", size: 0x2000, access: "rw" },
                MemorySpec { name: "CARTROM", size: 0x8000, access: "r" },
            ],
        },
        CoreSpec {
            name: "gambatte",
            platform: "GB",
            version: "0.5",
            memories: vec![
                MemorySpec { name: "WRAM", size: 0x2000, access: "rw" },
                MemorySpec { name: "HRAM", size: 0x7f, access: "rw" },
            ],
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulationState {
    Stopped,
    Running,
    Paused,
}

impl EmulationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmulationState::Stopped => "stopped",
            EmulationState::Running => "running",
            EmulationState::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Game {
    pub path: String,
    pub name: String,
    pub region: Option<String>,
}

impl Game {
    fn from_path(path: &str) -> Self {
        let name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let region = ["USA", "Europe", "Japan"]
            .iter()
            .find(|r| name.contains(&format!("({})", r)))
            .map(|r| r.to_string());
        Self {
            path: path.to_string(),
            name,
            region,
        }
    }
}

#[derive(Debug)]
struct Memory {
    name: &'static str,
    access: &'static str,
    data: Vec<u8>,
}

/// The emulated machine shared by all connections
#[derive(Debug)]
pub struct MockEmulator {
    cores: Vec<CoreSpec>,
    core: Option<usize>,
    memories: Vec<Memory>,
    state: EmulationState,
    game: Option<Game>,
    client_name: Option<String>,
}

impl Default for MockEmulator {
    fn default() -> Self {
        let mut emulator = Self::new(default_cores());
        emulator.load_core("snes9x");
        emulator
    }
}

type CommandResult = std::result::Result<ReplyFrame, (ErrorKind, String)>;

impl MockEmulator {
    /// An emulator with no core loaded
    pub fn new(cores: Vec<CoreSpec>) -> Self {
        Self {
            cores,
            core: None,
            memories: Vec::new(),
            state: EmulationState::Stopped,
            game: None,
            client_name: None,
        }
    }

    pub fn state(&self) -> EmulationState {
        self.state
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn current_core(&self) -> Option<&CoreSpec> {
        self.core.map(|i| &self.cores[i])
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Raw contents of a memory of the loaded core
    pub fn memory(&self, name: &str) -> Option<&[u8]> {
        self.memories
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.data.as_slice())
    }

    /// Load a core by name; an empty name unloads. Returns false for unknown cores.
    pub fn load_core(&mut self, name: &str) -> bool {
        if name.is_empty() {
            self.core = None;
            self.memories.clear();
            self.game = None;
            self.state = EmulationState::Stopped;
            return true;
        }

        let Some(index) = self.cores.iter().position(|c| c.name == name) else {
            return false;
        };
        self.core = Some(index);
        self.memories = self.cores[index]
            .memories
            .iter()
            .map(|m| Memory {
                name: m.name,
                access: m.access,
                data: vec![0; m.size],
            })
            .collect();
        self.game = None;
        self.state = EmulationState::Stopped;
        true
    }

    /// Execute one request and produce its reply
    pub fn execute(&mut self, request: &Request) -> ReplyFrame {
        debug!("Executing {} {:?}", request.keyword, request.args);
        match self.dispatch(request) {
            Ok(reply) => reply,
            Err((kind, reason)) => ReplyFrame::error(kind, reason),
        }
    }

    fn dispatch(&mut self, request: &Request) -> CommandResult {
        let Some(kind) = request.kind() else {
            return Err((
                ErrorKind::InvalidCommand,
                format!("Unknown command: {}", request.keyword),
            ));
        };

        match (kind, request.data.is_some()) {
            (CommandKind::CoreWrite, false) => {
                return Err((
                    ErrorKind::ProtocolError,
                    "CORE_WRITE must be sent as a binary command".to_string(),
                ))
            }
            (CommandKind::CoreWrite, true) | (_, false) => {}
            (_, true) => {
                return Err((
                    ErrorKind::ProtocolError,
                    format!("{} does not take binary data", kind),
                ))
            }
        }

        let args = request.args_text().trim();
        match kind {
            CommandKind::EmuInfo => Ok(self.emu_info()),
            CommandKind::EmuStatus => {
                let mut pairs = vec![("state", self.state.as_str().to_string())];
                if let Some(game) = &self.game {
                    pairs.push(("game", game.name.clone()));
                }
                Ok(ReplyFrame::pairs(pairs))
            }
            CommandKind::EmuReset | CommandKind::EmuReload => {
                self.require_game()?;
                self.clear_memories();
                self.state = EmulationState::Running;
                Ok(ReplyFrame::ok())
            }
            CommandKind::EmuStop => {
                self.require_game()?;
                self.state = EmulationState::Stopped;
                Ok(ReplyFrame::ok())
            }
            CommandKind::EmuPause | CommandKind::DebugBreak => {
                self.require_game()?;
                self.state = EmulationState::Paused;
                Ok(ReplyFrame::ok())
            }
            CommandKind::EmuResume | CommandKind::DebugContinue => {
                self.require_game()?;
                self.state = EmulationState::Running;
                Ok(ReplyFrame::ok())
            }
            CommandKind::LoadGame => {
                if args.is_empty() {
                    return Err((ErrorKind::InvalidArgument, "No game path given".to_string()));
                }
                if self.core.is_none() {
                    return Err((ErrorKind::CommandError, "No core loaded".to_string()));
                }
                self.game = Some(Game::from_path(args));
                self.clear_memories();
                self.state = EmulationState::Running;
                Ok(ReplyFrame::ok())
            }
            CommandKind::GameInfo => Ok(match &self.game {
                Some(game) => {
                    let mut pairs = vec![("name", game.name.clone()), ("file", game.path.clone())];
                    if let Some(region) = &game.region {
                        pairs.push(("region", region.clone()));
                    }
                    ReplyFrame::pairs(pairs)
                }
                None => ReplyFrame::ok(),
            }),
            CommandKind::CoresList => {
                let lines = self
                    .cores
                    .iter()
                    .filter(|c| args.is_empty() || c.platform.eq_ignore_ascii_case(args))
                    .flat_map(|c| [format!("name:{}", c.name), format!("platform:{}", c.platform)])
                    .collect();
                Ok(ReplyFrame::Ascii(lines))
            }
            CommandKind::CoreInfo => {
                let core = if args.is_empty() {
                    self.current_core()
                } else {
                    self.cores.iter().find(|c| c.name == args)
                };
                core.map(core_info)
                    .ok_or_else(|| (ErrorKind::InvalidArgument, format!("Unknown core: '{}'", args)))
            }
            CommandKind::CoreCurrentInfo => self
                .current_core()
                .map(core_info)
                .ok_or_else(|| (ErrorKind::CommandError, "No core loaded".to_string())),
            CommandKind::LoadCore => {
                if self.load_core(args) {
                    Ok(ReplyFrame::ok())
                } else {
                    Err((ErrorKind::InvalidArgument, format!("Unknown core: '{}'", args)))
                }
            }
            CommandKind::CoreMemories => {
                let lines = self
                    .memories
                    .iter()
                    .flat_map(|m| {
                        [
                            format!("name:{}", m.name),
                            format!("access:{}", m.access),
                            format!("size:{}", m.data.len()),
                        ]
                    })
                    .collect();
                Ok(ReplyFrame::Ascii(lines))
            }
            CommandKind::CoreRead => {
                let (name, regions) = parse_memory_args(args).map_err(invalid_argument)?;
                let memory = self.find_memory(&name, 'r')?;
                let len = read_len(memory.data.len(), &regions);
                if len > MAX_BINARY_LEN {
                    return Err((
                        ErrorKind::InvalidArgument,
                        format!("Read of {} bytes exceeds the {} byte limit", len, MAX_BINARY_LEN),
                    ));
                }
                Ok(ReplyFrame::Binary(read_regions(&memory.data, &regions).into()))
            }
            CommandKind::CoreWrite => {
                let (name, regions) = parse_memory_args(args).map_err(invalid_argument)?;
                let data = request.data.clone().unwrap_or_default();
                let memory = self.find_memory(&name, 'w')?;
                write_regions(&mut memory.data, &regions, &data)?;
                Ok(ReplyFrame::ok())
            }
            CommandKind::CoreReset => {
                self.clear_memories();
                self.state = if self.game.is_some() {
                    EmulationState::Running
                } else {
                    EmulationState::Stopped
                };
                Ok(ReplyFrame::ok())
            }
            CommandKind::MyNameIs => {
                self.client_name = Some(args.to_string());
                Ok(ReplyFrame::pairs([("name", args)]))
            }
        }
    }

    fn emu_info(&self) -> ReplyFrame {
        let commands: Vec<&str> = CommandKind::ALL.iter().map(|k| k.keyword()).collect();
        ReplyFrame::pairs([
            ("name", "emunwa-mock".to_string()),
            ("version", env!("CARGO_PKG_VERSION").to_string()),
            ("id", "mock".to_string()),
            ("commands", commands.join(",")),
        ])
    }

    fn require_game(&self) -> std::result::Result<(), (ErrorKind, String)> {
        match self.game {
            Some(_) => Ok(()),
            None => Err((ErrorKind::CommandError, "No game loaded".to_string())),
        }
    }

    fn clear_memories(&mut self) {
        for memory in &mut self.memories {
            memory.data.fill(0);
        }
    }

    fn find_memory(
        &mut self,
        name: &str,
        access: char,
    ) -> std::result::Result<&mut Memory, (ErrorKind, String)> {
        let memory = self
            .memories
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or_else(|| (ErrorKind::InvalidArgument, format!("Unknown memory: '{}'", name)))?;
        if !memory.access.contains(access) {
            return Err((
                ErrorKind::NotAllowed,
                format!("Memory '{}' is not accessible for '{}'", name, access),
            ));
        }
        Ok(memory)
    }
}

fn core_info(core: &CoreSpec) -> ReplyFrame {
    ReplyFrame::pairs([
        ("name", core.name),
        ("platform", core.platform),
        ("version", core.version),
    ])
}

fn invalid_argument(err: emunwa_common::Error) -> (ErrorKind, String) {
    (ErrorKind::InvalidArgument, err.to_string())
}

/// Size of the reply [`read_regions`] builds for a memory of `size` bytes
pub fn read_len(size: usize, regions: &[MemoryRegion]) -> usize {
    if regions.is_empty() {
        return size;
    }

    regions.iter().enumerate().fold(0usize, |total, (i, region)| {
        let start = region.start(size);
        let len = region
            .length
            .map(|l| l as usize)
            .unwrap_or_else(|| size.saturating_sub(start));
        let counted = if i + 1 < regions.len() {
            len
        } else {
            start.saturating_add(len).min(size).saturating_sub(start)
        };
        total.saturating_add(counted)
    })
}

/// Read regions in order
///
/// Bytes past the end of the memory are zero-padded, except in the last
/// region, which stops at the end of the memory.
pub fn read_regions(data: &[u8], regions: &[MemoryRegion]) -> Vec<u8> {
    if regions.is_empty() {
        return data.to_vec();
    }

    let size = data.len();
    let mut out = Vec::new();
    for (i, region) in regions.iter().enumerate() {
        let start = region.start(size);
        let len = region
            .length
            .map(|l| l as usize)
            .unwrap_or_else(|| size.saturating_sub(start));
        let in_bounds_end = start.saturating_add(len).min(size);
        let in_bounds = in_bounds_end.saturating_sub(start);
        if in_bounds > 0 {
            out.extend_from_slice(&data[start..in_bounds_end]);
        }
        if i + 1 < regions.len() {
            out.resize(out.len() + (len - in_bounds), 0);
        }
    }
    out
}

/// Write `data` across `regions` in order, dropping bytes past the end of the memory
pub fn write_regions(
    memory: &mut [u8],
    regions: &[MemoryRegion],
    data: &[u8],
) -> std::result::Result<(), (ErrorKind, String)> {
    let size = memory.len();
    let whole = [MemoryRegion::default()];
    let regions = if regions.is_empty() { &whole[..] } else { regions };

    let mut cursor = 0;
    for region in regions {
        let remaining = data.len() - cursor;
        let len = region.length.map(|l| l as usize).unwrap_or(remaining);
        if len > remaining {
            return Err((
                ErrorKind::InvalidArgument,
                format!(
                    "Region needs {} bytes but only {} bytes of data are left",
                    len, remaining
                ),
            ));
        }

        let start = region.start(size);
        let chunk = &data[cursor..cursor + len];
        cursor += len;
        if start < size {
            let n = chunk.len().min(size - start);
            memory[start..start + n].copy_from_slice(&chunk[..n]);
        }
    }
    Ok(())
}
