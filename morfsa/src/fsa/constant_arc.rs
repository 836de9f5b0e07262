//! The builder's output layout.
//!
//! Every arc is exactly [`CONSTANT_ARC_SIZE`] bytes: a flags byte, the
//! label, and a big-endian 32-bit target address where 0 is the terminal
//! sink. A state is the address of its first arc; arcs of a state follow
//! each other until one carries the last-arc bit. The epsilon state sits at
//! address 0 and its single arc points at the root.
use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::constants::{
    CONSTANT_ADDRESS_OFFSET, CONSTANT_ARC_SIZE, CONSTANT_BIT_FINAL, CONSTANT_BIT_LAST,
    CONSTANT_FLAGS_OFFSET, CONSTANT_LABEL_OFFSET,
};
use crate::fsa::{Fsa, FsaError};
use crate::types::{ArcIndex, NodeIndex};

/// An automaton whose arcs all have the same size.
pub struct ConstantArcSizeFsa {
    data: Vec<u8>,
    epsilon: NodeIndex,
}

impl fmt::Debug for ConstantArcSizeFsa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConstantArcSizeFsa")
            .field("bytes", &self.data.len())
            .field("arcs", &(self.data.len() / CONSTANT_ARC_SIZE))
            .field("root", &self.root_node())
            .finish()
    }
}

#[allow(clippy::len_without_is_empty)]
impl ConstantArcSizeFsa {
    /// Wrap a fixed-layout buffer whose epsilon state is at `epsilon`.
    ///
    /// The layout requires the epsilon state at address 0; anything else is
    /// a configuration error.
    pub fn new(data: Vec<u8>, epsilon: u32) -> Result<ConstantArcSizeFsa, FsaError> {
        if epsilon != 0 {
            return Err(FsaError::NonZeroEpsilon(epsilon));
        }
        if data.len() < CONSTANT_ARC_SIZE || data.len() % CONSTANT_ARC_SIZE != 0 {
            return Err(FsaError::MalformedStream(format!(
                "fixed-layout buffer of {} bytes is not a whole number of arcs",
                data.len()
            )));
        }

        Ok(ConstantArcSizeFsa {
            data,
            epsilon: NodeIndex(epsilon),
        })
    }

    /// Wrap a buffer the builder produced; epsilon is at 0 and arcs are whole.
    pub(crate) fn from_frozen(data: Vec<u8>) -> ConstantArcSizeFsa {
        debug_assert!(data.len() >= CONSTANT_ARC_SIZE && data.len() % CONSTANT_ARC_SIZE == 0);
        ConstantArcSizeFsa {
            data,
            epsilon: NodeIndex(0),
        }
    }

    /// The raw arc buffer.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Give up the raw arc buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Size of the arc buffer in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    fn flags_at(&self, arc: ArcIndex) -> u8 {
        self.data[arc.as_usize() + CONSTANT_FLAGS_OFFSET]
    }

    #[inline(always)]
    fn target_at(&self, arc: ArcIndex) -> u32 {
        let start = arc.as_usize() + CONSTANT_ADDRESS_OFFSET;
        BigEndian::read_u32(&self.data[start..start + 4])
    }
}

impl Fsa for ConstantArcSizeFsa {
    #[inline(always)]
    fn root_node(&self) -> Option<NodeIndex> {
        self.first_arc(self.epsilon)
            .and_then(|arc| self.end_node(arc))
    }

    #[inline(always)]
    fn first_arc(&self, node: NodeIndex) -> Option<ArcIndex> {
        Some(ArcIndex(node.0))
    }

    #[inline(always)]
    fn next_arc(&self, arc: ArcIndex) -> Option<ArcIndex> {
        if self.flags_at(arc) & CONSTANT_BIT_LAST != 0 {
            None
        } else {
            Some(ArcIndex(arc.0 + CONSTANT_ARC_SIZE as u32))
        }
    }

    #[inline(always)]
    fn arc_label(&self, arc: ArcIndex) -> u8 {
        self.data[arc.as_usize() + CONSTANT_LABEL_OFFSET]
    }

    #[inline(always)]
    fn is_arc_final(&self, arc: ArcIndex) -> bool {
        self.flags_at(arc) & CONSTANT_BIT_FINAL != 0
    }

    #[inline(always)]
    fn end_node(&self, arc: ArcIndex) -> Option<NodeIndex> {
        match self.target_at(arc) {
            0 => None,
            target => Some(NodeIndex(target)),
        }
    }
}
