//! Newline framing for the hub's inbound stream.
//!
//! Unlike `LinesCodec`, decoding never fails on content: invalid UTF-8 is
//! replaced and an over-long record is reported once and then discarded up
//! to its newline. Only I/O errors end the stream.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One framed inbound record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Record {
    Line(String),
    /// A record longer than the limit; its bytes are skipped.
    Oversized,
}

#[derive(Debug)]
pub(crate) struct RecordCodec {
    max_length: usize,
    /// Bytes already scanned for a newline.
    next_index: usize,
    discarding: bool,
}

impl RecordCodec {
    pub(crate) fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Record>, io::Error> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match (self.discarding, newline) {
                (true, Some(idx)) => {
                    buf.advance(idx + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(idx)) => {
                    self.next_index = 0;
                    let line = buf.split_to(idx + 1);
                    return Ok(Some(Record::Line(lossy(&line[..idx]))));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Record::Oversized));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Record>, io::Error> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }
        self.next_index = 0;
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(Some(Record::Line(lossy(&rest))))
    }
}
