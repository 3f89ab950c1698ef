// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

// emunwa - Common Library
// Emulator network access protocol, wire codec and async client

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod hex;
pub mod memory;
pub mod network;
pub mod protocol;

pub use client::{ClientEvent, EmuClient};
pub use codec::{ClientCodec, ServerCodec, MAX_BINARY_LEN, MAX_LINE_LEN};
pub use config::{config_dir, ClientConfig};
pub use error::{Error, Result};
pub use crate::hex::format_hex_dump;
pub use memory::{
    encode_regions, parse_address, parse_hex, parse_memory_args, parse_number, parse_regions,
    Address, MemoryRegion,
};
pub use network::format_host_port;
pub use protocol::{
    Command, CommandKind, ErrorKind, Reply, ReplyBody, ReplyFrame, Request, DEFAULT_PORT,
};
