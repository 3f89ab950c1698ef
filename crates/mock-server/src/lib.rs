// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! In-memory emulator that speaks the network access protocol
//!
//! Used for local development of front ends and by the integration tests.

pub mod config;
pub mod emulator;
pub mod server;

pub use config::ServerConfig;
pub use emulator::{default_cores, CoreSpec, EmulationState, MemorySpec, MockEmulator};
pub use server::{MockServer, SharedEmulator};
