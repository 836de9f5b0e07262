//! Incremental construction of minimal acyclic automata.
//!
//! Input sequences must arrive in strictly ascending order. The builder
//! keeps the states along the previously added sequence (the active path)
//! mutable; everything below the common prefix with the next sequence can no
//! longer change, so it is frozen into the output buffer. Before a state is
//! written, the register is consulted for an already frozen state with the
//! same arcs, which is then reused instead. Since states are frozen bottom
//! up, equal suffixes collapse into one and the result is minimal without a
//! separate minimization pass.
use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};
use hashbrown::HashMap;
use serde::Serialize;

use crate::compare::{common_prefix_length, compare_bytes};
use crate::constants::{
    CONSTANT_ADDRESS_OFFSET, CONSTANT_ARC_SIZE, CONSTANT_BIT_FINAL, CONSTANT_BIT_LAST,
    CONSTANT_FLAGS_OFFSET, CONSTANT_LABEL_OFFSET,
};
use crate::fsa::ConstantArcSizeFsa;

/// Error with building an automaton.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// A sequence sorts before the previously added one.
    #[error(
        "Input is not sorted: {:?} follows {:?}",
        String::from_utf8_lossy(.current),
        String::from_utf8_lossy(.previous)
    )]
    UnsortedInput {
        /// The previously added sequence.
        previous: Vec<u8>,
        /// The offending sequence.
        current: Vec<u8>,
    },
    /// A sequence equals the previously added one.
    #[error("Duplicate entry {:?}", String::from_utf8_lossy(.0))]
    DuplicateEntry(Vec<u8>),
    /// The empty sequence cannot be stored; finality is carried by arcs.
    #[error("Empty entries cannot be stored")]
    EmptyEntry,
    /// The output no longer fits 32-bit addresses.
    #[error("Automaton exceeds the 32-bit address space")]
    CapacityExceeded,
}

/// Counters describing a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    /// Sequences added.
    pub sequences: usize,
    /// States written to the output, the epsilon state excluded.
    pub states: usize,
    /// Arcs written to the output, the epsilon arc excluded.
    pub arcs: usize,
    /// Frozen states replaced by an equivalent registered state.
    pub register_hits: usize,
    /// Size of the output buffer.
    pub serialized_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingArc {
    label: u8,
    is_final: bool,
    target: u32,
}

/// Builds a minimal automaton from sorted input.
#[derive(Debug)]
pub struct FsaBuilder {
    serialized: Vec<u8>,
    // Encoded arcs of a frozen state -> its address.
    register: HashMap<Box<[u8]>, u32>,
    // Unfrozen states of the previous sequence; index is the depth.
    active_path: Vec<Vec<PendingArc>>,
    previous: Option<Vec<u8>>,
    info: BuildInfo,
}

impl Default for FsaBuilder {
    fn default() -> Self {
        FsaBuilder::new()
    }
}

impl FsaBuilder {
    /// An empty builder.
    pub fn new() -> FsaBuilder {
        let mut serialized = vec![0u8; CONSTANT_ARC_SIZE];
        serialized[CONSTANT_FLAGS_OFFSET] = CONSTANT_BIT_LAST;

        FsaBuilder {
            serialized,
            register: HashMap::new(),
            active_path: Vec::new(),
            previous: None,
            info: BuildInfo::default(),
        }
    }

    /// Build an automaton from a sorted iterator of sequences.
    pub fn build<I, S>(sequences: I) -> Result<ConstantArcSizeFsa, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut builder = FsaBuilder::new();
        for sequence in sequences {
            builder.add(sequence.as_ref())?;
        }
        builder.complete()
    }

    /// Add a sequence. It must sort strictly after the previous one.
    pub fn add(&mut self, sequence: &[u8]) -> Result<(), BuildError> {
        if sequence.is_empty() {
            return Err(BuildError::EmptyEntry);
        }

        let common = match &self.previous {
            Some(previous) => {
                match compare_bytes(previous, sequence) {
                    Ordering::Less => {}
                    Ordering::Equal => return Err(BuildError::DuplicateEntry(sequence.to_vec())),
                    Ordering::Greater => {
                        return Err(BuildError::UnsortedInput {
                            previous: previous.clone(),
                            current: sequence.to_vec(),
                        })
                    }
                }
                common_prefix_length(previous, sequence)
            }
            None => 0,
        };

        // Nothing below the common prefix can gain arcs any more.
        self.freeze_tail(common + 1)?;

        for (depth, &label) in sequence.iter().enumerate().skip(common) {
            if self.active_path.len() <= depth {
                self.active_path.push(Vec::new());
            }
            self.active_path[depth].push(PendingArc {
                label,
                is_final: false,
                target: 0,
            });
        }
        if let Some(arc) = self.active_path[sequence.len() - 1].last_mut() {
            arc.is_final = true;
        }

        match &mut self.previous {
            Some(previous) => {
                previous.clear();
                previous.extend_from_slice(sequence);
            }
            None => self.previous = Some(sequence.to_vec()),
        }
        self.info.sequences += 1;
        Ok(())
    }

    /// Counters of the build so far.
    pub fn info(&self) -> BuildInfo {
        BuildInfo {
            serialized_bytes: self.serialized.len(),
            ..self.info
        }
    }

    /// Freeze the remaining states, the root included, and return the automaton.
    pub fn complete(mut self) -> Result<ConstantArcSizeFsa, BuildError> {
        let root = self.freeze_tail(0)?;
        BigEndian::write_u32(
            &mut self.serialized[CONSTANT_ADDRESS_OFFSET..CONSTANT_ADDRESS_OFFSET + 4],
            root,
        );

        let info = self.info();
        log::info!(
            "Built automaton: {} sequences, {} states, {} arcs, {} register hits, {} bytes",
            info.sequences,
            info.states,
            info.arcs,
            info.register_hits,
            info.serialized_bytes
        );

        self.register.clear();
        Ok(ConstantArcSizeFsa::from_frozen(self.serialized))
    }

    /// Freeze active states until only `keep` remain, deepest first.
    ///
    /// Returns the address of the last state frozen, or 0 if none was.
    fn freeze_tail(&mut self, keep: usize) -> Result<u32, BuildError> {
        let mut address = 0;
        while self.active_path.len() > keep {
            let state = match self.active_path.pop() {
                Some(state) => state,
                None => break,
            };
            address = self.freeze(&state)?;
            if let Some(arc) = self.active_path.last_mut().and_then(|parent| parent.last_mut()) {
                arc.target = address;
            }
        }
        Ok(address)
    }

    fn freeze(&mut self, arcs: &[PendingArc]) -> Result<u32, BuildError> {
        let mut encoded = vec![0u8; arcs.len() * CONSTANT_ARC_SIZE];
        for (i, arc) in arcs.iter().enumerate() {
            let slot = &mut encoded[i * CONSTANT_ARC_SIZE..(i + 1) * CONSTANT_ARC_SIZE];
            let mut flags = 0;
            if arc.is_final {
                flags |= CONSTANT_BIT_FINAL;
            }
            if i + 1 == arcs.len() {
                flags |= CONSTANT_BIT_LAST;
            }
            slot[CONSTANT_FLAGS_OFFSET] = flags;
            slot[CONSTANT_LABEL_OFFSET] = arc.label;
            BigEndian::write_u32(&mut slot[CONSTANT_ADDRESS_OFFSET..], arc.target);
        }

        if let Some(&address) = self.register.get(&encoded[..]) {
            self.info.register_hits += 1;
            return Ok(address);
        }

        let address = self.serialized.len();
        if address + encoded.len() > u32::MAX as usize {
            return Err(BuildError::CapacityExceeded);
        }
        let address = address as u32;

        self.serialized.extend_from_slice(&encoded);
        self.info.states += 1;
        self.info.arcs += arcs.len();
        self.register.insert(encoded.into_boxed_slice(), address);

        log::trace!("froze state at {} with {} arcs", address, arcs.len());
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsa::Fsa;

    fn words(fsa: &ConstantArcSizeFsa) -> Vec<String> {
        fsa.sequences()
            .map(|s| String::from_utf8(s).unwrap())
            .collect()
    }

    #[test]
    fn small_set() {
        let input = ["a", "ab", "abc", "b"];
        let fsa = FsaBuilder::build(input).unwrap();
        assert_eq!(words(&fsa), input);

        let root = fsa.root_node().unwrap();
        assert_eq!(fsa.arc_count(root), 2);
        let b = fsa.arc(root, b'b').unwrap();
        assert!(fsa.is_arc_final(b));
        assert!(fsa.is_arc_terminal(b));
    }

    #[test]
    fn shared_suffixes_are_stored_once() {
        let fsa = FsaBuilder::build(["abc", "xbc"]).unwrap();
        let info = crate::traversal::FsaInfo::compute(&fsa);
        assert_eq!(info.states, 3);
        assert_eq!(info.arcs, 4);

        let root = fsa.root_node().unwrap();
        let a = fsa.arc(root, b'a').unwrap();
        let x = fsa.arc(root, b'x').unwrap();
        assert_eq!(fsa.end_node(a), fsa.end_node(x));
    }

    #[test]
    fn equal_structure_equal_size() {
        let left = FsaBuilder::build(["ab", "cb", "db"]).unwrap();
        let right = FsaBuilder::build(["xy", "yy", "zy"]).unwrap();
        assert_eq!(left.len(), right.len());
        assert_eq!(
            crate::traversal::FsaInfo::compute(&left).states,
            crate::traversal::FsaInfo::compute(&right).states
        );
    }

    #[test]
    fn register_hits_are_counted() {
        let mut builder = FsaBuilder::new();
        for word in ["bar", "car", "far", "farm", "harm"] {
            builder.add(word.as_bytes()).unwrap();
        }
        let info = builder.info();
        assert_eq!(info.sequences, 5);
        assert!(info.register_hits > 0);

        let fsa = builder.complete().unwrap();
        assert_eq!(words(&fsa), ["bar", "car", "far", "farm", "harm"]);
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut builder = FsaBuilder::new();
        builder.add(b"abc").unwrap();
        match builder.add(b"abc") {
            Err(BuildError::DuplicateEntry(entry)) => assert_eq!(entry, b"abc"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unsorted_is_rejected() {
        let result = FsaBuilder::build(["b", "a"]);
        assert!(matches!(result, Err(BuildError::UnsortedInput { .. })));

        // a prefix sorts first
        let result = FsaBuilder::build(["ab", "a"]);
        assert!(matches!(result, Err(BuildError::UnsortedInput { .. })));
    }

    #[test]
    fn empty_entry_is_rejected() {
        let mut builder = FsaBuilder::new();
        assert!(matches!(builder.add(b""), Err(BuildError::EmptyEntry)));
    }

    #[test]
    fn empty_input() {
        let fsa = FsaBuilder::new().complete().unwrap();
        assert_eq!(fsa.root_node(), None);
        assert_eq!(fsa.len(), CONSTANT_ARC_SIZE);
        assert_eq!(fsa.sequences().count(), 0);
    }

    #[test]
    fn high_bytes_sort_last() {
        let input: Vec<&[u8]> = vec![b"a", b"a\x7f", b"a\x80", b"a\xff", b"\xc3\xa4"];
        let fsa = FsaBuilder::build(&input).unwrap();
        let out: Vec<Vec<u8>> = fsa.sequences().collect();
        let expected: Vec<Vec<u8>> = input.iter().map(|s| s.to_vec()).collect();
        assert_eq!(out, expected);
    }
}
