//! Lookups against an automaton: membership, partial matches and perfect
//! hashing.
//!
//! Perfect hashing maps every accepted sequence to its lexicographic rank
//! in `0..n`. It needs the right-language count of every state, so the
//! automaton has to be serialized with numbers.
use crate::fsa::{Fsa, FsaError, FsaFlag};
use crate::types::NodeIndex;

/// How a sequence relates to the language of an automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The sequence is accepted.
    ExactMatch,
    /// Not even the first byte of the sequence has an arc.
    NoMatch,
    /// The walk left the automaton after `matched` bytes of the sequence.
    AutomatonHasPrefix {
        /// Bytes consumed before the walk failed.
        matched: usize,
    },
    /// The whole sequence was consumed and continues into `node`.
    SequenceIsAPrefix {
        /// The state reached after the last byte.
        node: NodeIndex,
    },
}

/// Walk `sequence` from the root.
pub fn match_sequence<F: Fsa + ?Sized>(fsa: &F, sequence: &[u8]) -> MatchResult {
    match fsa.root_node() {
        Some(root) => match_from(fsa, sequence, root),
        None => MatchResult::NoMatch,
    }
}

/// Walk `sequence` from `node`.
pub fn match_from<F: Fsa + ?Sized>(fsa: &F, sequence: &[u8], node: NodeIndex) -> MatchResult {
    let mut node = node;
    for (i, &label) in sequence.iter().enumerate() {
        let arc = match fsa.arc(node, label) {
            Some(arc) => arc,
            None if i > 0 => return MatchResult::AutomatonHasPrefix { matched: i },
            None => return MatchResult::NoMatch,
        };

        if i + 1 == sequence.len() && fsa.is_arc_final(arc) {
            return MatchResult::ExactMatch;
        }
        node = match fsa.end_node(arc) {
            Some(next) => next,
            None => return MatchResult::AutomatonHasPrefix { matched: i + 1 },
        };
    }
    MatchResult::SequenceIsAPrefix { node }
}

/// Whether `sequence` is accepted.
pub fn contains<F: Fsa + ?Sized>(fsa: &F, sequence: &[u8]) -> bool {
    match_sequence(fsa, sequence) == MatchResult::ExactMatch
}

/// The lexicographic rank of `sequence`, or `None` if it is not accepted.
pub fn perfect_hash<F: Fsa + ?Sized>(fsa: &F, sequence: &[u8]) -> Result<Option<u32>, FsaError> {
    if !fsa.flags().contains(FsaFlag::Numbers) {
        return Err(FsaError::MissingNumbers);
    }
    let mut node = match fsa.root_node() {
        Some(root) => root,
        None => return Ok(None),
    };
    if sequence.is_empty() {
        return Ok(None);
    }

    let mut hash = 0u32;
    'outer: for (i, &label) in sequence.iter().enumerate() {
        for arc in fsa.arcs(node) {
            let is_final = fsa.is_arc_final(arc);
            if fsa.arc_label(arc) == label {
                if i + 1 == sequence.len() {
                    return Ok(if is_final { Some(hash) } else { None });
                }
                if is_final {
                    hash += 1;
                }
                match fsa.end_node(arc) {
                    Some(next) => {
                        node = next;
                        continue 'outer;
                    }
                    None => return Ok(None),
                }
            }

            // Skip everything below this arc.
            if is_final {
                hash += 1;
            }
            if let Some(target) = fsa.end_node(arc) {
                hash += fsa
                    .right_language_count(target)
                    .ok_or(FsaError::MissingNumbers)?;
            }
        }
        return Ok(None);
    }
    Ok(None)
}

/// The sequence whose rank is `hash`, or `None` if there are not that many.
pub fn sequence_for_hash<F: Fsa + ?Sized>(fsa: &F, hash: u32) -> Result<Option<Vec<u8>>, FsaError> {
    if !fsa.flags().contains(FsaFlag::Numbers) {
        return Err(FsaError::MissingNumbers);
    }
    let mut node = match fsa.root_node() {
        Some(root) => root,
        None => return Ok(None),
    };

    let mut remaining = hash;
    let mut sequence = Vec::new();
    'outer: loop {
        for arc in fsa.arcs(node) {
            let is_final = fsa.is_arc_final(arc);
            let target = fsa.end_node(arc);
            let below = match target {
                Some(target) => fsa
                    .right_language_count(target)
                    .ok_or(FsaError::MissingNumbers)?,
                None => 0,
            };
            let here = u32::from(is_final) + below;
            if remaining >= here {
                remaining -= here;
                continue;
            }

            sequence.push(fsa.arc_label(arc));
            if is_final {
                if remaining == 0 {
                    return Ok(Some(sequence));
                }
                remaining -= 1;
            }
            match target {
                Some(target) => {
                    node = target;
                    continue 'outer;
                }
                None => return Ok(None),
            }
        }
        return Ok(None);
    }
}
