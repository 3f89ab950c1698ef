// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Memory region addressing
//!
//! A region list follows the memory name as `;`-separated offset/length
//! pairs: `WRAM;$231c;$1;$231b;$2`. Offsets accept `$hex`, `0xhex` or
//! decimal, and a leading `-` counts from the end of the memory. An empty
//! slot means "not given".

use std::fmt;

use crate::error::{Error, Result};

/// Start of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Offset from the start of the memory
    Start(u32),
    /// Offset back from the end of the memory (`FromEnd(1)` is the last byte)
    FromEnd(u32),
}

impl Address {
    /// Resolve against a memory of `size` bytes
    pub fn resolve(&self, size: usize) -> usize {
        match *self {
            Address::Start(offset) => offset as usize,
            Address::FromEnd(back) => size.saturating_sub(back as usize),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Start(offset) => write!(f, "${:x}", offset),
            Address::FromEnd(back) => write!(f, "-${:x}", back),
        }
    }
}

/// One region of a read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryRegion {
    /// `None` starts at offset 0
    pub offset: Option<Address>,
    /// `None` reads to the end of the memory, or writes the rest of the data
    pub length: Option<u32>,
}

impl MemoryRegion {
    pub fn new(offset: Option<Address>, length: Option<u32>) -> Self {
        Self { offset, length }
    }

    pub fn at(offset: u32, length: u32) -> Self {
        Self::new(Some(Address::Start(offset)), Some(length))
    }

    /// First byte of the region in a memory of `size` bytes
    pub fn start(&self, size: usize) -> usize {
        self.offset.map(|a| a.resolve(size)).unwrap_or(0)
    }
}

/// Encode regions as `;`-separated offset/length slots
///
/// Trailing empty slots are dropped so a single offset encodes as `$231c`.
pub fn encode_regions(regions: &[MemoryRegion]) -> String {
    let mut slots: Vec<String> = Vec::with_capacity(regions.len() * 2);
    for region in regions {
        slots.push(region.offset.map(|a| a.to_string()).unwrap_or_default());
        slots.push(region.length.map(|l| format!("${:x}", l)).unwrap_or_default());
    }
    while slots.last().is_some_and(|s| s.is_empty()) {
        slots.pop();
    }
    slots.join(";")
}

/// Parse a region list such as `$231c;1;$231b;2`
pub fn parse_regions(text: &str) -> Result<Vec<MemoryRegion>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let slots: Vec<&str> = text.split(';').map(str::trim).collect();
    slots
        .chunks(2)
        .map(|pair| {
            let offset = match pair[0] {
                "" => None,
                s => Some(parse_address(s)?),
            };
            let length = match pair.get(1).copied() {
                None | Some("") => None,
                Some(s) => Some(parse_number(s)?),
            };
            Ok(MemoryRegion { offset, length })
        })
        .collect()
}

/// Split `MEMORY[;regions]` into the memory name and its regions
pub fn parse_memory_args(text: &str) -> Result<(String, Vec<MemoryRegion>)> {
    let (memory, regions) = match text.split_once(';') {
        Some((memory, rest)) => (memory, parse_regions(rest)?),
        None => (text, Vec::new()),
    };
    let memory = memory.trim();
    if memory.is_empty() {
        return Err(Error::InvalidArgument("Memory name is missing".to_string()));
    }
    Ok((memory.to_string(), regions))
}

pub fn parse_address(text: &str) -> Result<Address> {
    match text.trim().strip_prefix('-') {
        Some(rest) => Ok(Address::FromEnd(parse_number(rest)?)),
        None => Ok(Address::Start(parse_number(text)?)),
    }
}

/// Parse `$hex`, `0xhex` or decimal
pub fn parse_number(text: &str) -> Result<u32> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    };
    parsed.map_err(|_| Error::InvalidArgument(format!("Invalid number: '{}'", text)))
}

/// Parse hex bytes, ignoring whitespace (`"aa 77"`, `"aa77"`)
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.split_whitespace().collect();
    hex::decode(&digits)
        .map_err(|e| Error::InvalidArgument(format!("Invalid hex data '{}': {}", text.trim(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("$231c").unwrap(), 0x231c);
        assert_eq!(parse_number("0x1FFFF").unwrap(), 0x1ffff);
        assert_eq!(parse_number("12").unwrap(), 12);
        assert!(parse_number("$").is_err());
        assert!(parse_number("zz").is_err());
        assert!(parse_number("-1").is_err());
    }

    #[test]
    fn test_parse_address_from_end() {
        assert_eq!(parse_address("-$1").unwrap(), Address::FromEnd(1));
        assert_eq!(parse_address("-16").unwrap(), Address::FromEnd(16));
        assert_eq!(Address::FromEnd(1).resolve(0x20000), 0x1ffff);
        assert_eq!(Address::FromEnd(5).resolve(2), 0);
    }

    #[test]
    fn test_parse_regions_pairs() {
        let regions = parse_regions("$231c;1;$231b;$2").unwrap();
        assert_eq!(regions, vec![MemoryRegion::at(0x231c, 1), MemoryRegion::at(0x231b, 2)]);

        let single = parse_regions("$1ffff").unwrap();
        assert_eq!(single, vec![MemoryRegion::new(Some(Address::Start(0x1ffff)), None)]);

        let no_offset = parse_regions(";$1").unwrap();
        assert_eq!(no_offset, vec![MemoryRegion::new(None, Some(1))]);

        assert!(parse_regions("").unwrap().is_empty());
        assert!(parse_regions("$231c;bogus").is_err());
    }

    #[test]
    fn test_encode_regions() {
        assert_eq!(
            encode_regions(&[MemoryRegion::at(0x231c, 1), MemoryRegion::at(0x231b, 2)]),
            "$231c;$1;$231b;$2"
        );
        assert_eq!(
            encode_regions(&[MemoryRegion::new(Some(Address::Start(0x231c)), None)]),
            "$231c"
        );
        assert_eq!(encode_regions(&[MemoryRegion::new(None, Some(1))]), ";$1");
        assert_eq!(
            encode_regions(&[MemoryRegion::new(Some(Address::FromEnd(1)), Some(1))]),
            "-$1;$1"
        );
        // An open-ended region in the middle keeps its empty length slot
        let mixed = [
            MemoryRegion::new(Some(Address::Start(4)), None),
            MemoryRegion::at(8, 2),
        ];
        assert_eq!(parse_regions(&encode_regions(&mixed)).unwrap(), mixed);
    }

    #[test]
    fn test_parse_memory_args() {
        let (memory, regions) = parse_memory_args("WRAM;$231c;$2").unwrap();
        assert_eq!(memory, "WRAM");
        assert_eq!(regions, vec![MemoryRegion::at(0x231c, 2)]);

        let (memory, regions) = parse_memory_args("SRAM").unwrap();
        assert_eq!(memory, "SRAM");
        assert!(regions.is_empty());

        assert!(parse_memory_args(";$1").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("aa 77").unwrap(), vec![0xaa, 0x77]);
        assert_eq!(parse_hex("0100").unwrap(), vec![0x01, 0x00]);
        assert!(parse_hex("").unwrap().is_empty());
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
        assert_eq!(parse_hex("DE ad\tbE\nef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);

        let err = parse_hex("a b c").unwrap_err().to_string();
        assert!(err.starts_with("Invalid argument: Invalid hex data 'a b c'"), "{}", err);
    }
}
