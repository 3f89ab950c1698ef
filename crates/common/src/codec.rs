// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Wire framing for both ends of the connection
//!
//! - ASCII reply: `\n`, `key:value\n` lines, then an empty line
//! - Binary block (reply or command payload): `\0`, u32 big-endian length, data
//! - Command: one text line, followed by a binary block for `b`-prefixed keywords

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, Result};
use crate::protocol::{Command, ReplyFrame, Request};

/// Largest binary block either side accepts
pub const MAX_BINARY_LEN: usize = 16 * 1024 * 1024;

/// Longest text line either side accepts
pub const MAX_LINE_LEN: usize = 64 * 1024;

const ASCII_MARKER: u8 = b'\n';
const BINARY_MARKER: u8 = 0;
const BINARY_HEADER_LEN: usize = 5;

/// Client side: writes commands, reads replies
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientCodec;

/// Server side: reads commands, writes replies
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerCodec;

impl Encoder<Command> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<()> {
        if let Some(data) = &command.data {
            check_binary_len(data.len())?;
        }
        let line = command.line();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        if let Some(data) = &command.data {
            put_binary_block(data, dst)?;
        }
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = ReplyFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ReplyFrame>> {
        let Some(&marker) = src.first() else {
            return Ok(None);
        };

        match marker {
            ASCII_MARKER => decode_ascii_reply(src),
            BINARY_MARKER => Ok(take_binary_block(src, 0)?.map(ReplyFrame::Binary)),
            other => Err(Error::Protocol(format!(
                "Unexpected reply marker byte 0x{:02x}",
                other
            ))),
        }
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>> {
        loop {
            let Some(newline) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_LINE_LEN {
                    return Err(Error::Protocol("Command line too long".to_string()));
                }
                return Ok(None);
            };

            let line = String::from_utf8_lossy(&src[..newline])
                .trim_end_matches('\r')
                .to_string();

            if line.is_empty() {
                src.advance(newline + 1);
                continue;
            }

            let (head, args) = match line.split_once(' ') {
                Some((head, args)) => (head.to_string(), Some(args.to_string())),
                None => (line.clone(), None),
            };

            if let Some(keyword) = head.strip_prefix('b') {
                let Some(data) = take_binary_block(src, newline + 1)? else {
                    return Ok(None);
                };
                src.advance(newline + 1);
                return Ok(Some(Request {
                    keyword: keyword.to_string(),
                    args,
                    data: Some(data),
                }));
            }

            src.advance(newline + 1);
            return Ok(Some(Request {
                keyword: head,
                args,
                data: None,
            }));
        }
    }
}

impl Encoder<ReplyFrame> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, frame: ReplyFrame, dst: &mut BytesMut) -> Result<()> {
        match frame {
            ReplyFrame::Ascii(lines) => {
                dst.put_u8(ASCII_MARKER);
                for line in lines {
                    dst.put_slice(line.replace('\n', " ").as_bytes());
                    dst.put_u8(b'\n');
                }
                dst.put_u8(b'\n');
                Ok(())
            }
            ReplyFrame::Binary(data) => put_binary_block(&data, dst),
        }
    }
}

fn decode_ascii_reply(src: &mut BytesMut) -> Result<Option<ReplyFrame>> {
    let mut line_start = 1;
    loop {
        let Some(rel) = src[line_start..].iter().position(|&b| b == b'\n') else {
            if src.len() - line_start > MAX_LINE_LEN {
                return Err(Error::Protocol("Reply line too long".to_string()));
            }
            return Ok(None);
        };
        if rel > MAX_LINE_LEN {
            return Err(Error::Protocol("Reply line too long".to_string()));
        }

        let line_end = line_start + rel;
        if rel == 0 {
            let frame = src.split_to(line_end + 1);
            let lines = frame[1..line_end]
                .split(|&b| b == b'\n')
                .filter(|l| !l.is_empty())
                .map(|l| String::from_utf8_lossy(l).trim_end_matches('\r').to_string())
                .collect();
            return Ok(Some(ReplyFrame::Ascii(lines)));
        }
        line_start = line_end + 1;
    }
}

/// Take a binary block starting at `at`, leaving everything before it in place
///
/// Returns `Ok(None)` until the whole block is buffered.
fn take_binary_block(src: &mut BytesMut, at: usize) -> Result<Option<Bytes>> {
    if src.len() < at + BINARY_HEADER_LEN {
        return Ok(None);
    }
    if src[at] != BINARY_MARKER {
        return Err(Error::Protocol(format!(
            "Expected binary block, found byte 0x{:02x}",
            src[at]
        )));
    }

    let len = u32::from_be_bytes([src[at + 1], src[at + 2], src[at + 3], src[at + 4]]) as usize;
    if len > MAX_BINARY_LEN {
        return Err(Error::Protocol(format!(
            "Binary block of {} bytes exceeds the {} byte limit",
            len, MAX_BINARY_LEN
        )));
    }

    let total = at + BINARY_HEADER_LEN + len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let mut block = src.split_off(at);
    let rest = block.split_off(BINARY_HEADER_LEN + len);
    block.advance(BINARY_HEADER_LEN);
    src.unsplit(rest);
    Ok(Some(block.freeze()))
}

/// Reject binary blocks the peer would refuse
pub(crate) fn check_binary_len(len: usize) -> Result<()> {
    if len > MAX_BINARY_LEN {
        return Err(Error::InvalidArgument(format!(
            "Binary block of {} bytes exceeds the {} byte limit",
            len, MAX_BINARY_LEN
        )));
    }
    Ok(())
}

fn put_binary_block(data: &[u8], dst: &mut BytesMut) -> Result<()> {
    check_binary_len(data.len())?;
    dst.reserve(BINARY_HEADER_LEN + data.len());
    dst.put_u8(BINARY_MARKER);
    dst.put_u32(data.len() as u32);
    dst.put_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegion;

    fn decode_all<D: Decoder>(codec: &mut D, bytes: &[u8]) -> Vec<D::Item>
    where
        D::Error: std::fmt::Debug,
    {
        let mut buf = BytesMut::from(bytes);
        let mut items = Vec::new();
        while let Some(item) = codec.decode(&mut buf).unwrap() {
            items.push(item);
        }
        assert!(buf.is_empty(), "leftover bytes: {:?}", buf);
        items
    }

    #[test]
    fn test_decode_ascii_and_ok_replies() {
        let frames = decode_all(&mut ClientCodec, b"\nstate:running\ngame:test\n\n\n\n");
        assert_eq!(
            frames,
            vec![
                ReplyFrame::Ascii(vec!["state:running".into(), "game:test".into()]),
                ReplyFrame::ok(),
            ]
        );
    }

    #[test]
    fn test_decode_binary_reply() {
        let frames = decode_all(&mut ClientCodec, b"\0\0\0\0\x03\x02\x00\x02\0\0\0\0\0");
        assert_eq!(
            frames,
            vec![
                ReplyFrame::Binary(Bytes::from_static(&[2, 0, 2])),
                ReplyFrame::Binary(Bytes::new()),
            ]
        );
    }

    #[test]
    fn test_partial_reply_is_not_consumed() {
        let mut codec = ClientCodec;
        let mut buf = BytesMut::from(&b"\nstate:running\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 15);

        let mut buf = BytesMut::from(&b"\0\0\0\0\x04\xaa"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\x00\x00\xaa");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ReplyFrame::Binary(Bytes::from_static(&[0xaa, 0, 0, 0xaa])))
        );
    }

    #[test]
    fn test_bad_marker_and_oversize_block() {
        let mut buf = BytesMut::from(&b"Xjunk"[..]);
        assert!(ClientCodec.decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"\0\xff\xff\xff\xff"[..]);
        assert!(ClientCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_encode_binary_command() {
        let mut buf = BytesMut::new();
        let command = Command::core_write("WRAM", &[MemoryRegion::at(0x231c, 2)], vec![1u8, 0]);
        ClientCodec.encode(command, &mut buf).unwrap();
        assert_eq!(&buf[..], b"bCORE_WRITE WRAM;$231c;$2\n\0\0\0\0\x02\x01\x00");
    }

    #[test]
    fn test_oversize_command_writes_nothing() {
        let mut buf = BytesMut::new();
        let command = Command::core_write(
            "WRAM",
            &[MemoryRegion::at(0, 1)],
            vec![0u8; MAX_BINARY_LEN + 1],
        );
        assert!(matches!(
            ClientCodec.encode(command, &mut buf),
            Err(Error::InvalidArgument(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_server_decodes_commands() {
        let requests = decode_all(
            &mut ServerCodec,
            b"EMU_STATUS\r\n\nbCORE_WRITE WRAM;$0\n\0\0\0\0\x01\xaaCORES_LIST SNES\n",
        );
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].keyword, "EMU_STATUS");
        assert_eq!(requests[0].args, None);
        assert_eq!(requests[1].keyword, "CORE_WRITE");
        assert_eq!(requests[1].args_text(), "WRAM;$0");
        assert_eq!(requests[1].data.as_deref(), Some(&[0xaa][..]));
        assert_eq!(requests[2].args_text(), "SNES");
    }

    #[test]
    fn test_server_waits_for_binary_payload() {
        let mut buf = BytesMut::from(&b"bCORE_WRITE WRAM\n\0\0\0"[..]);
        assert!(ServerCodec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 20);
    }

    #[test]
    fn test_server_encodes_replies() {
        let mut buf = BytesMut::new();
        ServerCodec
            .encode(ReplyFrame::pairs([("state", "paused")]), &mut buf)
            .unwrap();
        ServerCodec.encode(ReplyFrame::ok(), &mut buf).unwrap();
        ServerCodec
            .encode(ReplyFrame::Binary(Bytes::from_static(&[7])), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"\nstate:paused\n\n\n\n\0\0\0\0\x01\x07");
    }
}
