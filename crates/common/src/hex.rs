// Hex dump formatting for binary replies

/// Bytes per output line
pub const BYTES_PER_LINE: usize = 16;

/// Lowercase, space-separated hex, 16 bytes per line, lines joined by `\n`
pub fn format_hex_dump(data: &[u8]) -> String {
    data.chunks(BYTES_PER_LINE)
        .map(|line| {
            line.iter()
                .map(|b| hex::encode([*b]))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_dump() {
        assert_eq!(format_hex_dump(&[0x02, 0x00, 0x02]), "02 00 02");
        assert_eq!(format_hex_dump(&[0xaa]), "aa");
        assert_eq!(format_hex_dump(&[]), "");
    }

    #[test]
    fn test_wraps_after_sixteen_bytes() {
        let data: Vec<u8> = (0u8..20).collect();
        let dump = format_hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f");
        assert_eq!(lines[1], "10 11 12 13");
    }

    #[test]
    fn test_exactly_one_line_has_no_trailing_newline() {
        let dump = format_hex_dump(&[0xff; 16]);
        assert!(!dump.contains('\n'));
    }
}
