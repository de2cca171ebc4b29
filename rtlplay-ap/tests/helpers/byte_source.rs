//! In-memory byte producers

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};

/// Byte producer fed through a channel.
///
/// `read` blocks while the channel is empty and reports end of stream once
/// every sender is dropped.
pub struct ChannelSource {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl ChannelSource {
    pub fn new() -> (Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel();
        (
            tx,
            Self {
                rx,
                pending: Vec::new(),
                offset: 0,
            },
        )
    }
}

impl Read for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Little-endian bytes of 16-bit samples, as rtl_fm writes them
pub fn pcm_bytes(samples: impl IntoIterator<Item = i16>) -> Vec<u8> {
    samples.into_iter().flat_map(i16::to_le_bytes).collect()
}
