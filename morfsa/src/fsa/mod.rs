//! Read-only automata and the arc/state contract they share.
//!
//! An automaton is a graph of states connected by labeled arcs. Every
//! representation in this crate, from the builder's fixed-layout output to
//! the FSA5 and CFSA2 stream readers, implements [`Fsa`], so traversal,
//! counting and serialization never depend on the storage layout.
pub mod cfsa2;
pub mod constant_arc;
pub mod flags;
pub mod fsa5;
pub mod header;

use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

pub use self::cfsa2::Cfsa2;
pub use self::constant_arc::ConstantArcSizeFsa;
pub use self::flags::{FsaFlag, FsaFlags};
pub use self::fsa5::Fsa5;
pub use self::header::FsaHeader;

use crate::constants::{CFSA2_VERSION, FSA5_VERSION};
use crate::memory::Memory;
use crate::traversal::Sequences;
use crate::types::{ArcIndex, NodeIndex};

/// Error with reading an automaton.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FsaError {
    /// The stream does not start with the automaton magic.
    #[error("Malformed header, expected the `\\fsa` magic")]
    MalformedHeader,
    /// The stream ended before a complete header or value could be read.
    #[error("Truncated stream")]
    TruncatedStream,
    /// The stream has a valid header but an inconsistent body.
    #[error("Malformed stream: {0}")]
    MalformedStream(String),
    /// The version byte names a layout this crate cannot read.
    #[error("Unsupported automaton version {0:#04x}")]
    UnsupportedVersion(u8),
    /// A fixed-layout automaton was given an epsilon state other than 0.
    #[error("Epsilon state must be at address 0, got {0}")]
    NonZeroEpsilon(u32),
    /// Perfect hashing needs right-language counts the automaton does not store.
    #[error("Automaton does not store right-language counts")]
    MissingNumbers,
    /// Error with input/output.
    #[error("IO error")]
    Io(#[source] std::io::Error),
    /// Error with mmapping
    #[error("Memory mapping error")]
    Memmap(#[source] std::io::Error),
}

/// A deterministic acyclic automaton over bytes.
///
/// States and arcs are opaque offsets. Arcs of a state are visited with
/// [`first_arc`](Fsa::first_arc) / [`next_arc`](Fsa::next_arc) in ascending
/// label order. An arc is *final* if following it completes an accepted
/// sequence, and *terminal* if it leads nowhere.
pub trait Fsa {
    /// The state accepted sequences start from, `None` for the empty language.
    fn root_node(&self) -> Option<NodeIndex>;
    /// The first outgoing arc of `node`.
    fn first_arc(&self, node: NodeIndex) -> Option<ArcIndex>;
    /// The arc following `arc` in the same state, `None` after the last one.
    fn next_arc(&self, arc: ArcIndex) -> Option<ArcIndex>;
    /// The byte `arc` consumes.
    fn arc_label(&self, arc: ArcIndex) -> u8;
    /// Whether following `arc` completes an accepted sequence.
    fn is_arc_final(&self, arc: ArcIndex) -> bool;
    /// The state `arc` leads to, `None` if the arc is terminal.
    fn end_node(&self, arc: ArcIndex) -> Option<NodeIndex>;

    /// Whether `arc` leads to the terminal sink.
    #[inline(always)]
    fn is_arc_terminal(&self, arc: ArcIndex) -> bool {
        self.end_node(arc).is_none()
    }

    /// Capabilities of the underlying representation.
    fn flags(&self) -> FsaFlags {
        FsaFlags::empty()
    }

    /// The number of sequences accepted from `node`, if the representation
    /// stores it.
    fn right_language_count(&self, _node: NodeIndex) -> Option<u32> {
        None
    }

    /// The arc of `node` labeled `label`.
    fn arc(&self, node: NodeIndex, label: u8) -> Option<ArcIndex> {
        self.arcs(node).find(|arc| self.arc_label(*arc) == label)
    }

    /// Iterate over the outgoing arcs of `node`.
    fn arcs(&self, node: NodeIndex) -> Arcs<'_, Self> {
        Arcs {
            fsa: self,
            next: self.first_arc(node),
        }
    }

    /// Number of outgoing arcs of `node`.
    fn arc_count(&self, node: NodeIndex) -> usize {
        self.arcs(node).count()
    }

    /// Every accepted sequence, in lexicographic order.
    fn sequences(&self) -> Sequences<'_, Self> {
        Sequences::new(self, self.root_node())
    }

    /// Every sequence accepted from `node`, in lexicographic order.
    fn sequences_from(&self, node: NodeIndex) -> Sequences<'_, Self> {
        Sequences::new(self, Some(node))
    }
}

/// Iterator over the arcs of one state.
pub struct Arcs<'a, F: Fsa + ?Sized> {
    fsa: &'a F,
    next: Option<ArcIndex>,
}

impl<'a, F: Fsa + ?Sized> Iterator for Arcs<'a, F> {
    type Item = ArcIndex;

    #[inline]
    fn next(&mut self) -> Option<ArcIndex> {
        let arc = self.next?;
        self.next = self.fsa.next_arc(arc);
        Some(arc)
    }
}

/// A serialized automaton of either layout, chosen by its header.
#[derive(Debug)]
pub enum AnyFsa<M: Memory> {
    /// Fixed goto-length layout.
    Fsa5(Fsa5<M>),
    /// Label-indexed, v-int coded layout.
    Cfsa2(Cfsa2<M>),
}

macro_rules! dispatch {
    ($self:expr, $fsa:ident => $body:expr) => {
        match $self {
            AnyFsa::Fsa5($fsa) => $body,
            AnyFsa::Cfsa2($fsa) => $body,
        }
    };
}

impl<M: Memory> AnyFsa<M> {
    /// The layout version byte.
    pub fn version(&self) -> u8 {
        match self {
            AnyFsa::Fsa5(_) => FSA5_VERSION,
            AnyFsa::Cfsa2(_) => CFSA2_VERSION,
        }
    }

    /// Size of the serialized automaton in bytes, header included.
    pub fn byte_len(&self) -> usize {
        dispatch!(self, fsa => fsa.byte_len())
    }
}

impl<M: Memory> Fsa for AnyFsa<M> {
    #[inline(always)]
    fn root_node(&self) -> Option<NodeIndex> {
        dispatch!(self, fsa => fsa.root_node())
    }

    #[inline(always)]
    fn first_arc(&self, node: NodeIndex) -> Option<ArcIndex> {
        dispatch!(self, fsa => fsa.first_arc(node))
    }

    #[inline(always)]
    fn next_arc(&self, arc: ArcIndex) -> Option<ArcIndex> {
        dispatch!(self, fsa => fsa.next_arc(arc))
    }

    #[inline(always)]
    fn arc_label(&self, arc: ArcIndex) -> u8 {
        dispatch!(self, fsa => fsa.arc_label(arc))
    }

    #[inline(always)]
    fn is_arc_final(&self, arc: ArcIndex) -> bool {
        dispatch!(self, fsa => fsa.is_arc_final(arc))
    }

    #[inline(always)]
    fn end_node(&self, arc: ArcIndex) -> Option<NodeIndex> {
        dispatch!(self, fsa => fsa.end_node(arc))
    }

    fn flags(&self) -> FsaFlags {
        dispatch!(self, fsa => fsa.flags())
    }

    fn right_language_count(&self, node: NodeIndex) -> Option<u32> {
        dispatch!(self, fsa => fsa.right_language_count(node))
    }
}

/// Read an automaton of either layout from a buffer.
pub fn read<M: Memory>(memory: M) -> Result<AnyFsa<M>, FsaError> {
    let header = FsaHeader::parse(memory.bytes())?;
    match header.version() {
        FSA5_VERSION => Ok(AnyFsa::Fsa5(Fsa5::from_memory(memory)?)),
        CFSA2_VERSION => Ok(AnyFsa::Cfsa2(Cfsa2::from_memory(memory)?)),
        v => Err(FsaError::UnsupportedVersion(v)),
    }
}

/// Read an automaton of either layout from a stream.
pub fn read_from<R: Read>(mut reader: R) -> Result<AnyFsa<Vec<u8>>, FsaError> {
    let mut buf = vec![];
    reader.read_to_end(&mut buf).map_err(FsaError::Io)?;
    read(buf)
}

/// Memory-map a file and read an automaton of either layout from it.
pub fn open<P: AsRef<Path>>(path: P) -> Result<AnyFsa<Mmap>, FsaError> {
    let file = std::fs::File::open(path).map_err(FsaError::Io)?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(FsaError::Memmap)?;
    read(mmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version() {
        let buf = b"\\fsa\x07\x00".to_vec();
        assert!(matches!(read(buf), Err(FsaError::UnsupportedVersion(7))));
    }

    #[test]
    fn bad_magic_is_rejected_wholesale() {
        let buf = b"\\fsx\x05_+\x01".to_vec();
        assert!(matches!(read(buf), Err(FsaError::MalformedHeader)));
    }

    #[test]
    fn truncated_header() {
        assert!(matches!(
            read_from(&b"\\fsa"[..]),
            Err(FsaError::TruncatedStream)
        ));
    }
}
