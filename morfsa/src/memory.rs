//! Byte storage backing the automaton readers.
//!
//! Readers are generic over where their bytes live: an owned buffer, a
//! borrowed slice or a memory-mapped file all work the same way.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Random access reads over a byte buffer.
///
/// Implemented for every `AsRef<[u8]>`, which covers `Vec<u8>`, `&[u8]`,
/// `Box<[u8]>` and [`memmap2::Mmap`].
pub trait Memory {
    /// The whole buffer.
    fn bytes(&self) -> &[u8];

    /// Read a single byte at the given offset.
    #[inline(always)]
    fn read_u8_at(&self, offset: usize) -> u8 {
        self.bytes()[offset]
    }

    /// Read a big-endian u16 at the given offset.
    #[inline(always)]
    fn read_u16_be_at(&self, offset: usize) -> u16 {
        BigEndian::read_u16(&self.bytes()[offset..offset + 2])
    }

    /// Read a big-endian u32 at the given offset.
    #[inline(always)]
    fn read_u32_be_at(&self, offset: usize) -> u32 {
        BigEndian::read_u32(&self.bytes()[offset..offset + 4])
    }

    /// Read a little-endian unsigned integer of `width` bytes (1 to 8).
    #[inline(always)]
    fn read_uint_le_at(&self, offset: usize, width: usize) -> u64 {
        LittleEndian::read_uint(&self.bytes()[offset..offset + width], width)
    }

    /// Total length in bytes.
    #[inline(always)]
    fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether the buffer holds no bytes at all.
    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl<T: AsRef<[u8]>> Memory for T {
    #[inline(always)]
    fn bytes(&self) -> &[u8] {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads() {
        let buf = vec![0x01u8, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(buf.read_u8_at(4), 5);
        assert_eq!(buf.read_u16_be_at(0), 0x0102);
        assert_eq!(buf.read_u32_be_at(1), 0x0203_0405);
        assert_eq!(buf.read_uint_le_at(0, 3), 0x0003_0201);
        assert_eq!(Memory::len(&buf.as_slice()), 5);
    }
}
