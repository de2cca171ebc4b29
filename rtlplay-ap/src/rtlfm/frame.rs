//! Fixed-size frame decoding from a byte stream

use crate::audio::sample::{decode_le, Sample};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};

/// Reads whole frames of little-endian samples from `R`.
///
/// The byte buffer is kept between calls so a steady frame size never
/// reallocates.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Fill `frame` with exactly `frame.len()` samples.
    ///
    /// The stream ending before the frame is complete, including at a frame
    /// boundary, is [`Error::ShortRead`].
    pub fn read_frame<T: Sample>(&mut self, frame: &mut [T]) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }

        let expected = frame.len() * T::FORMAT.bytes();
        self.buf.resize(expected, 0);

        let mut received = 0;
        while received < expected {
            match self.reader.read(&mut self.buf[received..]) {
                Ok(0) => return Err(Error::ShortRead { expected, received }),
                Ok(n) => received += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        decode_le(&self.buf, frame);
        Ok(())
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
