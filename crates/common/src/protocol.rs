// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Protocol vocabulary: commands, replies and server error kinds
//!
//! Commands are sent as `KEYWORD[ ARGS]\n`, binary commands as
//! `bKEYWORD[ ARGS]\n` followed by a binary block. Replies carry no command
//! name on the wire, so the client tags each one with the command that was
//! pending when it arrived.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::Error;
use crate::memory::{encode_regions, MemoryRegion};

/// Default TCP port of an emulator network access server (0xFF78)
pub const DEFAULT_PORT: u16 = 65400;

/// Every command understood by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    EmuInfo,
    EmuStatus,
    EmuReset,
    EmuStop,
    EmuPause,
    EmuResume,
    EmuReload,
    LoadGame,
    GameInfo,
    CoresList,
    CoreInfo,
    CoreCurrentInfo,
    LoadCore,
    CoreMemories,
    CoreRead,
    CoreWrite,
    CoreReset,
    DebugBreak,
    DebugContinue,
    MyNameIs,
}

impl CommandKind {
    pub const ALL: [CommandKind; 20] = [
        CommandKind::EmuInfo,
        CommandKind::EmuStatus,
        CommandKind::EmuReset,
        CommandKind::EmuStop,
        CommandKind::EmuPause,
        CommandKind::EmuResume,
        CommandKind::EmuReload,
        CommandKind::LoadGame,
        CommandKind::GameInfo,
        CommandKind::CoresList,
        CommandKind::CoreInfo,
        CommandKind::CoreCurrentInfo,
        CommandKind::LoadCore,
        CommandKind::CoreMemories,
        CommandKind::CoreRead,
        CommandKind::CoreWrite,
        CommandKind::CoreReset,
        CommandKind::DebugBreak,
        CommandKind::DebugContinue,
        CommandKind::MyNameIs,
    ];

    /// Keyword as sent on the wire (without the binary `b` prefix)
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandKind::EmuInfo => "EMU_INFO",
            CommandKind::EmuStatus => "EMU_STATUS",
            CommandKind::EmuReset => "EMU_RESET",
            CommandKind::EmuStop => "EMU_STOP",
            CommandKind::EmuPause => "EMU_PAUSE",
            CommandKind::EmuResume => "EMU_RESUME",
            CommandKind::EmuReload => "EMU_RELOAD",
            CommandKind::LoadGame => "LOAD_GAME",
            CommandKind::GameInfo => "GAME_INFO",
            CommandKind::CoresList => "CORES_LIST",
            CommandKind::CoreInfo => "CORE_INFO",
            CommandKind::CoreCurrentInfo => "CORE_CURRENT_INFO",
            CommandKind::LoadCore => "LOAD_CORE",
            CommandKind::CoreMemories => "CORE_MEMORIES",
            CommandKind::CoreRead => "CORE_READ",
            CommandKind::CoreWrite => "CORE_WRITE",
            CommandKind::CoreReset => "CORE_RESET",
            CommandKind::DebugBreak => "DEBUG_BREAK",
            CommandKind::DebugContinue => "DEBUG_CONTINUE",
            CommandKind::MyNameIs => "MY_NAME_IS",
        }
    }

    /// Commands whose successful reply carries no data
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            CommandKind::EmuStop
                | CommandKind::EmuPause
                | CommandKind::EmuResume
                | CommandKind::EmuReset
                | CommandKind::EmuReload
                | CommandKind::CoreReset
                | CommandKind::LoadGame
                | CommandKind::LoadCore
                | CommandKind::CoreWrite
                | CommandKind::DebugBreak
                | CommandKind::DebugContinue
                | CommandKind::MyNameIs
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.keyword() == s)
            .ok_or_else(|| Error::Protocol(format!("Unknown command keyword: {}", s)))
    }
}

/// A command ready to be encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// `;`-separated argument list; empty means no argument section
    pub args: Vec<String>,
    /// Binary block; when present the command is sent in binary form
    pub data: Option<Bytes>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
            data: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Text line sent for this command, without the trailing newline
    pub fn line(&self) -> String {
        let mut line = String::new();
        if self.data.is_some() {
            line.push('b');
        }
        line.push_str(self.kind.keyword());
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&self.args.join(";"));
        }
        line
    }

    pub fn emu_info() -> Self {
        Self::new(CommandKind::EmuInfo)
    }

    pub fn emu_status() -> Self {
        Self::new(CommandKind::EmuStatus)
    }

    pub fn emu_reset() -> Self {
        Self::new(CommandKind::EmuReset)
    }

    pub fn emu_stop() -> Self {
        Self::new(CommandKind::EmuStop)
    }

    pub fn emu_pause() -> Self {
        Self::new(CommandKind::EmuPause)
    }

    pub fn emu_resume() -> Self {
        Self::new(CommandKind::EmuResume)
    }

    pub fn emu_reload() -> Self {
        Self::new(CommandKind::EmuReload)
    }

    pub fn load_game(path: &str) -> Self {
        Self::new(CommandKind::LoadGame).arg(path)
    }

    pub fn game_info() -> Self {
        Self::new(CommandKind::GameInfo)
    }

    pub fn cores_list(platform: Option<&str>) -> Self {
        match platform {
            Some(p) if !p.is_empty() => Self::new(CommandKind::CoresList).arg(p),
            _ => Self::new(CommandKind::CoresList),
        }
    }

    pub fn core_info(core: &str) -> Self {
        Self::new(CommandKind::CoreInfo).arg(core)
    }

    pub fn core_current_info() -> Self {
        Self::new(CommandKind::CoreCurrentInfo)
    }

    /// An empty core name unloads the current core
    pub fn load_core(core: &str) -> Self {
        Self::new(CommandKind::LoadCore).arg(core)
    }

    pub fn core_memories() -> Self {
        Self::new(CommandKind::CoreMemories)
    }

    pub fn core_read(memory: &str, regions: &[MemoryRegion]) -> Self {
        Self::new(CommandKind::CoreRead).arg(memory_args(memory, regions))
    }

    pub fn core_write(memory: &str, regions: &[MemoryRegion], data: impl Into<Bytes>) -> Self {
        Self::new(CommandKind::CoreWrite)
            .arg(memory_args(memory, regions))
            .data(data)
    }

    pub fn core_reset() -> Self {
        Self::new(CommandKind::CoreReset)
    }

    pub fn debug_break() -> Self {
        Self::new(CommandKind::DebugBreak)
    }

    pub fn debug_continue() -> Self {
        Self::new(CommandKind::DebugContinue)
    }

    pub fn my_name_is(name: &str) -> Self {
        Self::new(CommandKind::MyNameIs).arg(name)
    }
}

fn memory_args(memory: &str, regions: &[MemoryRegion]) -> String {
    let regions = encode_regions(regions);
    if regions.is_empty() {
        memory.to_string()
    } else {
        format!("{};{}", memory, regions)
    }
}

/// A decoded command as seen by a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Keyword without the binary prefix
    pub keyword: String,
    /// Raw argument text after the first space, if any
    pub args: Option<String>,
    /// Binary block for `b`-prefixed commands
    pub data: Option<Bytes>,
}

impl Request {
    pub fn kind(&self) -> Option<CommandKind> {
        self.keyword.parse().ok()
    }

    pub fn args_text(&self) -> &str {
        self.args.as_deref().unwrap_or("")
    }
}

/// Error kinds a server reports in the `error` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    ProtocolError,
    CommandError,
    InvalidCommand,
    InvalidArgument,
    NotAllowed,
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::CommandError => "command_error",
            ErrorKind::InvalidCommand => "invalid_command",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotAllowed => "not_allowed",
            ErrorKind::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "protocol_error" => ErrorKind::ProtocolError,
            "command_error" => ErrorKind::CommandError,
            "invalid_command" => ErrorKind::InvalidCommand,
            "invalid_argument" => ErrorKind::InvalidArgument,
            "not_allowed" => ErrorKind::NotAllowed,
            other => ErrorKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply as framed on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFrame {
    /// `key:value` lines, without the terminating empty line
    Ascii(Vec<String>),
    Binary(Bytes),
}

impl ReplyFrame {
    /// The empty success reply
    pub fn ok() -> Self {
        ReplyFrame::Ascii(Vec::new())
    }

    pub fn error(kind: ErrorKind, reason: impl Into<String>) -> Self {
        ReplyFrame::Ascii(vec![
            format!("error:{}", kind),
            format!("reason:{}", reason.into()),
        ])
    }

    pub fn pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        ReplyFrame::Ascii(
            pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k.as_ref(), v.as_ref()))
                .collect(),
        )
    }
}

/// Payload of a tagged reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Ascii(Vec<String>),
    Binary(Bytes),
    Error { kind: ErrorKind, reason: String },
}

/// A reply tagged with the command it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `None` when the reply arrived while no command was pending
    pub command: Option<CommandKind>,
    pub body: ReplyBody,
}

impl Reply {
    pub fn from_frame(command: Option<CommandKind>, frame: ReplyFrame) -> Self {
        let body = match frame {
            ReplyFrame::Binary(data) => ReplyBody::Binary(data),
            ReplyFrame::Ascii(lines) => {
                match lines.first().and_then(|l| split_line(l)) {
                    Some(("error", kind)) => {
                        let reason = lines
                            .iter()
                            .filter_map(|l| split_line(l))
                            .find(|(k, _)| *k == "reason")
                            .map(|(_, v)| v.to_string())
                            .unwrap_or_default();
                        ReplyBody::Error {
                            kind: ErrorKind::parse(kind),
                            reason,
                        }
                    }
                    _ => ReplyBody::Ascii(lines),
                }
            }
        };
        Self { command, body }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ReplyBody::Error { .. })
    }

    pub fn is_ascii(&self) -> bool {
        matches!(self.body, ReplyBody::Ascii(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.body, ReplyBody::Binary(_))
    }

    pub fn is(&self, kind: CommandKind) -> bool {
        self.command == Some(kind)
    }

    pub fn ascii(&self) -> &[String] {
        match &self.body {
            ReplyBody::Ascii(lines) => lines,
            _ => &[],
        }
    }

    pub fn binary(&self) -> Option<&Bytes> {
        match &self.body {
            ReplyBody::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Error text for display; falls back to the kind when no reason was sent
    pub fn error_message(&self) -> Option<String> {
        match &self.body {
            ReplyBody::Error { kind, reason } if reason.is_empty() => Some(kind.to_string()),
            ReplyBody::Error { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }

    /// All `key:value` lines as one map; later keys win
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.ascii()
            .iter()
            .filter_map(|l| split_line(l))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Lines grouped into maps; a repeated key starts the next map
    pub fn to_map_list(&self) -> Vec<BTreeMap<String, String>> {
        let mut maps = Vec::new();
        let mut current: BTreeMap<String, String> = BTreeMap::new();
        for (k, v) in self.ascii().iter().filter_map(|l| split_line(l)) {
            if current.contains_key(k) {
                maps.push(std::mem::take(&mut current));
            }
            current.insert(k.to_string(), v.to_string());
        }
        if !current.is_empty() {
            maps.push(current);
        }
        maps
    }

    /// Convert an error reply into `Err`, pass everything else through
    pub fn into_result(self) -> crate::Result<Self> {
        match self.body {
            ReplyBody::Error { kind, reason } => Err(Error::Server { kind, reason }),
            _ => Ok(self),
        }
    }
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
}
