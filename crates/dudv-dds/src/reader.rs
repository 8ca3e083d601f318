//! Streaming helpers for reading fixed-layout structures.

use std::io::{self, Read};

use zerocopy::FromBytes;

/// Extends `Read` with methods for pulling fixed-size structures and bounded
/// payloads off a stream.
pub trait ReadExt: Read {
    /// Read a structure from the stream.
    fn read_struct<T: FromBytes>(&mut self) -> io::Result<T> {
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size];
        self.read_exact(&mut bytes)?;
        T::read_from_bytes(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))
    }

    /// Read up to `len` bytes, stopping early at end of stream.
    ///
    /// The returned buffer is shorter than `len` only if the stream ran out.
    fn read_up_to(&mut self, len: usize) -> io::Result<Vec<u8>>
    where
        Self: Sized,
    {
        let mut buf = Vec::new();
        self.by_ref().take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read> ReadExt for R {}
