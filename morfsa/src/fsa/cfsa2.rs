//! Reader for the label-indexed (CFSA2) layout.
//!
//! After the common header: a big-endian 16-bit flag mask, the label table
//! length `N` and `N` table bytes. Entry 0 of the table is unused, so a
//! label index of 0 in an arc means the label follows as a literal byte.
//!
//! The body starts with the epsilon node at address 0, which doubles as the
//! terminal sink address. Each node is an optional v-coded right-language
//! count followed by arcs of `[flags | label index]`, an optional literal
//! label, and a v-coded target address unless the target-next bit is set.
use crate::constants::{
    CFSA2_BIT_FINAL, CFSA2_BIT_LAST, CFSA2_BIT_TARGET_NEXT, CFSA2_LABEL_INDEX_MASK,
    CFSA2_LABEL_INDEX_SIZE, CFSA2_VERSION, HEADER_SIZE,
};
use crate::fsa::{Fsa, FsaError, FsaFlag, FsaFlags, FsaHeader};
use crate::memory::Memory;
use crate::types::{ArcIndex, NodeIndex};
use crate::vint;

const EPSILON_NODE: usize = 0;

/// A CFSA2 automaton over a byte buffer.
#[derive(Debug)]
pub struct Cfsa2<M: Memory> {
    memory: M,
    flags: FsaFlags,
    has_numbers: bool,
    labels: Vec<u8>,
    body_offset: usize,
}

impl<M: Memory> Cfsa2<M> {
    /// Parse the header and label table and wrap the buffer.
    pub fn from_memory(memory: M) -> Result<Cfsa2<M>, FsaError> {
        let header = FsaHeader::parse(memory.bytes())?;
        if header.version() != CFSA2_VERSION {
            return Err(FsaError::UnsupportedVersion(header.version()));
        }
        if memory.len() < HEADER_SIZE + 3 {
            return Err(FsaError::TruncatedStream);
        }

        let flags = FsaFlags::from_mask(memory.read_u16_be_at(HEADER_SIZE));
        let table_len = usize::from(memory.read_u8_at(HEADER_SIZE + 2));
        if table_len > CFSA2_LABEL_INDEX_SIZE + 1 {
            return Err(FsaError::MalformedStream(format!(
                "label table of {} entries exceeds {}",
                table_len,
                CFSA2_LABEL_INDEX_SIZE + 1
            )));
        }

        let table_start = HEADER_SIZE + 3;
        let body_offset = table_start + table_len;
        if memory.len() <= body_offset {
            return Err(FsaError::TruncatedStream);
        }
        let labels = memory.bytes()[table_start..body_offset].to_vec();

        let fsa = Cfsa2 {
            memory,
            flags,
            has_numbers: flags.contains(FsaFlag::Numbers),
            labels,
            body_offset,
        };

        // Validate the epsilon arc up to and including its target address.
        let mut pos = EPSILON_NODE;
        if fsa.has_numbers {
            vint::decode(fsa.body(), pos)?;
            pos = vint::skip(fsa.body(), pos);
        }
        let flag = *fsa.body().get(pos).ok_or(FsaError::TruncatedStream)?;
        if flag & CFSA2_BIT_TARGET_NEXT == 0 {
            let address = pos + if flag & CFSA2_LABEL_INDEX_MASK == 0 { 2 } else { 1 };
            vint::decode(fsa.body(), address)?;
        }

        log::debug!(
            "CFSA2: flags [{}], {} indexed labels, {} bytes",
            flags,
            table_len.saturating_sub(1),
            fsa.memory.len()
        );
        Ok(fsa)
    }

    /// The label table; entry `i` is the label encoded by index `i` (entry 0 is unused).
    pub fn label_table(&self) -> &[u8] {
        &self.labels
    }

    /// Size of the serialized automaton in bytes, header included.
    pub fn byte_len(&self) -> usize {
        self.memory.len()
    }

    #[inline(always)]
    fn body(&self) -> &[u8] {
        &self.memory.bytes()[self.body_offset..]
    }

    #[inline(always)]
    fn byte(&self, pos: usize) -> u8 {
        self.memory.read_u8_at(self.body_offset + pos)
    }

    #[inline(always)]
    fn is_last(&self, arc: usize) -> bool {
        self.byte(arc) & CFSA2_BIT_LAST != 0
    }

    #[inline(always)]
    fn skip_arc(&self, arc: usize) -> usize {
        let flag = self.byte(arc);
        let mut pos = arc + 1;
        if flag & CFSA2_LABEL_INDEX_MASK == 0 {
            pos += 1;
        }
        if flag & CFSA2_BIT_TARGET_NEXT == 0 {
            pos = vint::skip(self.body(), pos);
        }
        pos
    }

    #[inline(always)]
    fn destination(&self, arc: usize) -> u32 {
        let flag = self.byte(arc);
        if flag & CFSA2_BIT_TARGET_NEXT != 0 {
            // the target follows the last arc of this node
            let mut last = arc;
            while !self.is_last(last) {
                last = self.skip_arc(last);
            }
            self.skip_arc(last) as u32
        } else {
            let address = arc + if flag & CFSA2_LABEL_INDEX_MASK == 0 { 2 } else { 1 };
            vint::read(self.body(), address)
        }
    }
}

impl<M: Memory> Fsa for Cfsa2<M> {
    fn root_node(&self) -> Option<NodeIndex> {
        self.first_arc(NodeIndex(EPSILON_NODE as u32))
            .and_then(|arc| self.end_node(arc))
    }

    #[inline(always)]
    fn first_arc(&self, node: NodeIndex) -> Option<ArcIndex> {
        if self.has_numbers {
            Some(ArcIndex(vint::skip(self.body(), node.as_usize()) as u32))
        } else {
            Some(ArcIndex(node.0))
        }
    }

    #[inline(always)]
    fn next_arc(&self, arc: ArcIndex) -> Option<ArcIndex> {
        if self.is_last(arc.as_usize()) {
            None
        } else {
            Some(ArcIndex(self.skip_arc(arc.as_usize()) as u32))
        }
    }

    #[inline(always)]
    fn arc_label(&self, arc: ArcIndex) -> u8 {
        let index = self.byte(arc.as_usize()) & CFSA2_LABEL_INDEX_MASK;
        if index > 0 {
            self.labels[usize::from(index)]
        } else {
            self.byte(arc.as_usize() + 1)
        }
    }

    #[inline(always)]
    fn is_arc_final(&self, arc: ArcIndex) -> bool {
        self.byte(arc.as_usize()) & CFSA2_BIT_FINAL != 0
    }

    #[inline(always)]
    fn end_node(&self, arc: ArcIndex) -> Option<NodeIndex> {
        match self.destination(arc.as_usize()) {
            0 => None,
            offset => Some(NodeIndex(offset)),
        }
    }

    fn flags(&self) -> FsaFlags {
        self.flags
    }

    fn right_language_count(&self, node: NodeIndex) -> Option<u32> {
        if self.has_numbers {
            Some(vint::read(self.body(), node.as_usize()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {"ab", "b"}, label 'b' indexed as 1, no numbers.
    //
    //  0: epsilon  [last]['^'][3]
    //  3: root     [0]['a'][8]  [final|last|1][0]
    //  8: s1       [final|last|1][0]
    fn sample() -> Vec<u8> {
        let mut buf = b"\\fsa\xc6".to_vec();
        buf.extend_from_slice(&FsaFlags::of(&[FsaFlag::Flexible]).mask().to_be_bytes());
        buf.extend_from_slice(&[2, 0, b'b']);
        buf.extend_from_slice(&[CFSA2_BIT_LAST, b'^', 3]);
        buf.extend_from_slice(&[0, b'a', 8]);
        buf.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST | 1, 0]);
        buf.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST | 1, 0]);
        buf
    }

    #[test]
    fn walk() {
        let fsa = Cfsa2::from_memory(sample()).unwrap();
        assert_eq!(fsa.label_table(), &[0, b'b']);
        let words: Vec<Vec<u8>> = fsa.sequences().collect();
        assert_eq!(words, vec![b"ab".to_vec(), b"b".to_vec()]);
        assert!(fsa.right_language_count(fsa.root_node().unwrap()).is_none());
    }

    #[test]
    fn target_next_on_inner_arc() {
        // root: ['a' -> next node, not last]['c' final last terminal]; s1: ['b' final last]
        let mut buf = b"\\fsa\xc6".to_vec();
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&[CFSA2_BIT_LAST, b'^', 3]);
        buf.extend_from_slice(&[CFSA2_BIT_TARGET_NEXT, b'a']);
        buf.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST, b'c', 0]);
        buf.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST, b'b', 0]);

        let fsa = Cfsa2::from_memory(buf).unwrap();
        let words: Vec<Vec<u8>> = fsa.sequences().collect();
        assert_eq!(words, vec![b"ab".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn truncated_epsilon() {
        let mut buf = sample();
        buf.truncate(HEADER_SIZE + 3 + 2 + 2);
        assert!(matches!(
            Cfsa2::from_memory(buf),
            Err(FsaError::TruncatedStream)
        ));
    }

    #[test]
    fn oversized_label_table() {
        let mut buf = b"\\fsa\xc6\x00\x00".to_vec();
        buf.push(40);
        buf.extend_from_slice(&[0; 44]);
        assert!(matches!(
            Cfsa2::from_memory(buf),
            Err(FsaError::MalformedStream(_))
        ));
    }
}
