use std::io::{Read, Write};

use crate::constants::{FSA_MAGIC, HEADER_SIZE};
use crate::fsa::FsaError;

/// The header shared by every automaton stream: a magic literal and a
/// version byte identifying the layout that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsaHeader {
    version: u8,
}

#[allow(clippy::len_without_is_empty)]
impl FsaHeader {
    /// A header announcing the given layout version.
    pub fn new(version: u8) -> FsaHeader {
        FsaHeader { version }
    }

    /// Parse a header from the start of `buf`.
    ///
    /// A magic mismatch in the bytes that are present is reported as
    /// [`FsaError::MalformedHeader`], even if the buffer is also short.
    pub fn parse(buf: &[u8]) -> Result<FsaHeader, FsaError> {
        let present = buf.len().min(FSA_MAGIC.len());
        if buf[..present] != FSA_MAGIC[..present] {
            return Err(FsaError::MalformedHeader);
        }

        if buf.len() < HEADER_SIZE {
            return Err(FsaError::TruncatedStream);
        }

        Ok(FsaHeader {
            version: buf[FSA_MAGIC.len()],
        })
    }

    /// Read a header from a stream, consuming exactly its bytes.
    pub fn read<R: Read>(reader: &mut R) -> Result<FsaHeader, FsaError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        reader
            .by_ref()
            .take(HEADER_SIZE as u64)
            .read_to_end(&mut buf)
            .map_err(FsaError::Io)?;
        FsaHeader::parse(&buf)
    }

    /// Write this header.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&FSA_MAGIC)?;
        writer.write_all(&[self.version])
    }

    /// The layout version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Size of the header in bytes.
    pub fn len(&self) -> usize {
        HEADER_SIZE
    }
}
