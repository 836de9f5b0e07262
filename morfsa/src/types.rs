//! Identifiers for states and arcs.
//!
//! Both are byte offsets into the buffer backing an automaton. They are only
//! meaningful for the automaton that produced them and are compared by
//! identity, never by content.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A state (node) of an automaton, addressed by its byte offset.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[serde(transparent)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    /// The offset of this state in its automaton's buffer.
    #[inline(always)]
    pub fn offset(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An arc (transition) of an automaton, addressed by its byte offset.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ArcIndex(pub(crate) u32);

impl ArcIndex {
    /// The offset of this arc in its automaton's buffer.
    #[inline(always)]
    pub fn offset(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for ArcIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
