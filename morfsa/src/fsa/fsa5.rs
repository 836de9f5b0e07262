//! Reader for the fixed goto-length (FSA5) layout.
//!
//! After the common header come three bytes: the filler byte, the
//! annotation separator and `(node_data_length << 4) | goto_length`. The
//! body starts with a dummy node at address 0 (the terminal sink) and the
//! epsilon node whose only arc leads to the root.
//!
//! A node is `node_data_length` bytes of little-endian right-language count
//! followed by its arcs. An arc is its label and `goto_length` little-endian
//! bytes holding `(target << 3) | flags`, or the label and a single flags
//! byte if the target is the node right after this arc's node.
use crate::constants::{
    FSA5_BIT_FINAL, FSA5_BIT_LAST, FSA5_BIT_TARGET_NEXT, FSA5_FLAG_BITS, FSA5_MAX_GOTO_LENGTH,
    FSA5_VERSION, HEADER_SIZE,
};
use crate::fsa::{Fsa, FsaError, FsaFlag, FsaFlags, FsaHeader};
use crate::memory::Memory;
use crate::types::{ArcIndex, NodeIndex};

const ADDRESS_OFFSET: usize = 1;
const BODY_OFFSET: usize = HEADER_SIZE + 3;

/// An FSA5 automaton over a byte buffer.
#[derive(Debug)]
pub struct Fsa5<M: Memory> {
    memory: M,
    filler: u8,
    annotation: u8,
    node_data_length: usize,
    goto_length: usize,
    flags: FsaFlags,
}

impl<M: Memory> Fsa5<M> {
    /// Parse the header and wrap the buffer. The body is read lazily.
    pub fn from_memory(memory: M) -> Result<Fsa5<M>, FsaError> {
        let header = FsaHeader::parse(memory.bytes())?;
        if header.version() != FSA5_VERSION {
            return Err(FsaError::UnsupportedVersion(header.version()));
        }
        if memory.len() < BODY_OFFSET {
            return Err(FsaError::TruncatedStream);
        }

        let filler = memory.read_u8_at(HEADER_SIZE);
        let annotation = memory.read_u8_at(HEADER_SIZE + 1);
        let packed = memory.read_u8_at(HEADER_SIZE + 2);
        let node_data_length = usize::from(packed >> 4);
        let goto_length = usize::from(packed & 0x0f);

        if goto_length == 0 || goto_length > FSA5_MAX_GOTO_LENGTH {
            return Err(FsaError::MalformedStream(format!(
                "goto length {} is outside 1..={}",
                goto_length, FSA5_MAX_GOTO_LENGTH
            )));
        }
        if node_data_length > std::mem::size_of::<u32>() {
            return Err(FsaError::MalformedStream(format!(
                "node data length {} does not fit a 32-bit count",
                node_data_length
            )));
        }

        let mut flags = FsaFlags::of(&[FsaFlag::Flexible, FsaFlag::StopBit, FsaFlag::NextBit]);
        if node_data_length > 0 {
            flags.insert(FsaFlag::Numbers);
        }

        let fsa = Fsa5 {
            memory,
            filler,
            annotation,
            node_data_length,
            goto_length,
            flags,
        };

        // The dummy and epsilon nodes must be complete.
        let epsilon_arc = fsa.epsilon_node() + node_data_length;
        let needed = epsilon_arc + 1 + ADDRESS_OFFSET;
        if fsa.memory.len() < BODY_OFFSET + needed {
            return Err(FsaError::TruncatedStream);
        }
        if fsa.memory.len() < BODY_OFFSET + fsa.skip_arc(epsilon_arc) {
            return Err(FsaError::TruncatedStream);
        }

        log::debug!(
            "FSA5: goto length {}, node data length {}, {} bytes",
            goto_length,
            node_data_length,
            fsa.memory.len()
        );
        Ok(fsa)
    }

    /// The filler byte declared in the header.
    pub fn filler(&self) -> u8 {
        self.filler
    }

    /// The annotation separator declared in the header.
    pub fn annotation_separator(&self) -> u8 {
        self.annotation
    }

    /// Bytes used by every arc's address field.
    pub fn goto_length(&self) -> usize {
        self.goto_length
    }

    /// Bytes of right-language count in front of every node, 0 if absent.
    pub fn node_data_length(&self) -> usize {
        self.node_data_length
    }

    /// Size of the serialized automaton in bytes, header included.
    pub fn byte_len(&self) -> usize {
        self.memory.len()
    }

    #[inline(always)]
    fn byte(&self, pos: usize) -> u8 {
        self.memory.read_u8_at(BODY_OFFSET + pos)
    }

    #[inline(always)]
    fn epsilon_node(&self) -> usize {
        // skip the dummy node
        self.node_data_length + 1 + self.goto_length
    }

    #[inline(always)]
    fn is_next_set(&self, arc: usize) -> bool {
        self.byte(arc + ADDRESS_OFFSET) & FSA5_BIT_TARGET_NEXT != 0
    }

    #[inline(always)]
    fn skip_arc(&self, arc: usize) -> usize {
        if self.is_next_set(arc) {
            arc + 1 + 1
        } else {
            arc + 1 + self.goto_length
        }
    }

    #[inline(always)]
    fn destination(&self, arc: usize) -> u32 {
        if self.is_next_set(arc) {
            // only ever set on a last arc, so the next node starts right after it
            self.skip_arc(arc) as u32
        } else {
            let combined = self
                .memory
                .read_uint_le_at(BODY_OFFSET + arc + ADDRESS_OFFSET, self.goto_length);
            (combined >> FSA5_FLAG_BITS) as u32
        }
    }
}

impl<M: Memory> Fsa for Fsa5<M> {
    fn root_node(&self) -> Option<NodeIndex> {
        let epsilon = NodeIndex(self.epsilon_node() as u32);
        self.first_arc(epsilon).and_then(|arc| self.end_node(arc))
    }

    #[inline(always)]
    fn first_arc(&self, node: NodeIndex) -> Option<ArcIndex> {
        Some(ArcIndex((node.as_usize() + self.node_data_length) as u32))
    }

    #[inline(always)]
    fn next_arc(&self, arc: ArcIndex) -> Option<ArcIndex> {
        if self.byte(arc.as_usize() + ADDRESS_OFFSET) & FSA5_BIT_LAST != 0 {
            None
        } else {
            Some(ArcIndex(self.skip_arc(arc.as_usize()) as u32))
        }
    }

    #[inline(always)]
    fn arc_label(&self, arc: ArcIndex) -> u8 {
        self.byte(arc.as_usize())
    }

    #[inline(always)]
    fn is_arc_final(&self, arc: ArcIndex) -> bool {
        self.byte(arc.as_usize() + ADDRESS_OFFSET) & FSA5_BIT_FINAL != 0
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
        if self.node_data_length == 0 {
            return None;
        }
        let count = self
            .memory
            .read_uint_le_at(BODY_OFFSET + node.as_usize(), self.node_data_length);
        Some(count as u32)
    }
}
