// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

// Network utility functions

use std::net::IpAddr;

/// Join host and port into a socket address string
/// IPv6 literals are bracketed (`[::1]:65400`)
pub fn format_host_port(host: &str, port: u16) -> String {
    let host = host.trim();
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]:{}", bare, port),
        _ => format!("{}:{}", host, port),
    }
}
