//! Writer for the label-indexed (CFSA2) layout.
//!
//! Three things make this layout smaller than FSA5:
//!
//! - The most frequent labels are stored in a table and arcs refer to them
//!   through an index packed into the flags byte.
//! - Node counts and arc addresses are v-coded, so small addresses are cheap.
//! - States with many incoming arcs are moved to the front of the stream,
//!   where their addresses are smallest.
//!
//! Output size is not monotonic in the number of moved states, so a few cut
//! points are tried instead of searching for an optimum.
use std::cmp::Reverse;
use std::io::{self, Write};

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use super::{milestone, write_all, FsaSerializer, LayoutTuning, SerializeError};
use crate::constants::{
    CFSA2_BIT_FINAL, CFSA2_BIT_LAST, CFSA2_BIT_TARGET_NEXT, CFSA2_LABEL_INDEX_SIZE, CFSA2_VERSION,
    EPSILON_LABEL, HEADER_SIZE,
};
use crate::fsa::{Fsa, FsaFlag, FsaFlags, FsaHeader};
use crate::traversal::{right_language_counts, visit_pre_order, RightLanguageCounts};
use crate::types::NodeIndex;
use crate::vint;

const MAX_PASSES: usize = 64;

// Layout passes start from addresses that take the most bytes and shrink.
const MAX_OFFSET: u32 = u32::MAX;

/// Serializes automata to the CFSA2 layout.
#[derive(Debug, Clone, Default)]
pub struct Cfsa2Serializer {
    flags: FsaFlags,
    tuning: LayoutTuning,
}

impl Cfsa2Serializer {
    /// A serializer with the default layout tuning.
    pub fn new() -> Cfsa2Serializer {
        Cfsa2Serializer::default()
    }

    /// Store the right-language count of every state.
    pub fn with_numbers(self) -> Cfsa2Serializer {
        self.with_flag(FsaFlag::Numbers)
    }

    /// Request an arbitrary flag.
    pub fn with_flag(mut self, flag: FsaFlag) -> Cfsa2Serializer {
        self.flags.insert(flag);
        self
    }

    /// Replace the node layout search parameters.
    pub fn with_tuning(mut self, tuning: LayoutTuning) -> Cfsa2Serializer {
        self.tuning = tuning;
        self
    }
}

impl FsaSerializer for Cfsa2Serializer {
    fn format_name(&self) -> &'static str {
        "CFSA2"
    }

    fn supported_flags(&self) -> FsaFlags {
        FsaFlags::of(&[
            FsaFlag::Flexible,
            FsaFlag::StopBit,
            FsaFlag::NextBit,
            FsaFlag::Numbers,
        ])
    }

    fn requested_flags(&self) -> FsaFlags {
        self.flags
    }

    fn serialize_with_progress<F, W>(
        &self,
        fsa: &F,
        out: &mut W,
        progress: &mut dyn FnMut(u8),
    ) -> Result<usize, SerializeError>
    where
        F: Fsa + ?Sized,
        W: Write,
    {
        self.check_flags()?;

        let with_numbers = self.flags.contains(FsaFlag::Numbers);
        let mut pass = Cfsa2Pass::new(fsa, with_numbers);
        progress(milestone::PREPARED);

        pass.linearize(&self.tuning)?;
        progress(milestone::LAYOUT);

        let mut flags = FsaFlags::of(&[FsaFlag::Flexible, FsaFlag::StopBit, FsaFlag::NextBit]);
        if with_numbers {
            flags.insert(FsaFlag::Numbers);
        }
        FsaHeader::new(CFSA2_VERSION)
            .write(out)
            .map_err(SerializeError::Io)?;
        write_all(out, &flags.mask().to_be_bytes())?;
        write_all(out, &[pass.labels.len() as u8])?;
        write_all(out, &pass.labels)?;
        progress(milestone::HEADER);

        let body = pass.emit(out)?;
        progress(milestone::ARCS);

        out.flush().map_err(SerializeError::Io)?;
        progress(milestone::DONE);

        let written = HEADER_SIZE + 3 + pass.labels.len() + body;
        log::debug!(
            "CFSA2: {} states, {} indexed labels, {} bytes",
            pass.linearized.len(),
            pass.labels.len() - 1,
            written
        );
        Ok(written)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Layout,
    Emit,
}

#[derive(Debug, Default)]
struct Outcome {
    size: u64,
    changed: bool,
}

/// State of one serialize call.
struct Cfsa2Pass<'a, F: Fsa + ?Sized> {
    fsa: &'a F,
    // Label table as written, entry 0 unused.
    labels: Vec<u8>,
    // Label -> table index, 0 if written literally.
    label_index: [u8; 256],
    numbers: Option<RightLanguageCounts>,
    linearized: Vec<NodeIndex>,
    offsets: HashMap<NodeIndex, u32>,
    scratch: Vec<u8>,
}

impl<'a, F: Fsa + ?Sized> Cfsa2Pass<'a, F> {
    fn new(fsa: &'a F, with_numbers: bool) -> Cfsa2Pass<'a, F> {
        let (labels, label_index) = label_table(fsa);
        Cfsa2Pass {
            fsa,
            labels,
            label_index,
            numbers: if with_numbers {
                Some(right_language_counts(fsa))
            } else {
                None
            },
            linearized: Vec::new(),
            offsets: HashMap::new(),
            scratch: Vec::with_capacity(vint::MAX_VINT_LENGTH),
        }
    }

    /// Pick the node order, leaving its offsets in place for emission.
    fn linearize(&mut self, tuning: &LayoutTuning) -> Result<(), SerializeError> {
        let candidates: Vec<NodeIndex> = in_link_counts(self.fsa)
            .into_iter()
            .filter(|&(_, count)| count > tuning.min_inlinks)
            .sorted_by_key(|&(node, count)| Reverse((count, node)))
            .map(|(node, _)| node)
            .collect();

        let baseline = self.linearize_with(&[])?;
        log::debug!(
            "CFSA2 layout: {} bytes without moves, {} candidates",
            baseline,
            candidates.len()
        );

        let mut best_cut = 0;
        let mut best_size = baseline;
        if !candidates.is_empty() && tuning.cut_step > 0 {
            let end = tuning.cut_end.min(candidates.len());
            let mut cut = tuning.cut_start.min(candidates.len());
            while cut <= end {
                let size = self.linearize_with(&candidates[..cut])?;
                log::debug!("CFSA2 layout: moved {} states, {} bytes", cut, size);
                if size >= best_size {
                    break;
                }
                best_cut = cut;
                best_size = size;
                cut += tuning.cut_step;
            }
        }

        let size = self.linearize_with(&candidates[..best_cut])?;
        log::debug!("CFSA2 layout: moving {} states, {} bytes", best_cut, size);
        Ok(())
    }

    /// Lay out `moved` first, then everything else depth first, and compute
    /// offsets. Returns the body size.
    fn linearize_with(&mut self, moved: &[NodeIndex]) -> Result<u64, SerializeError> {
        let fsa = self.fsa;
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut linearized = Vec::new();

        for &node in moved {
            if !visited.contains(&node) {
                place_state(fsa, node, &mut visited, &mut stack, &mut linearized);
            }
        }
        if let Some(root) = fsa.root_node() {
            stack.push(root);
        }
        while let Some(node) = stack.pop() {
            if !visited.contains(&node) {
                place_state(fsa, node, &mut visited, &mut stack, &mut linearized);
            }
        }
        self.linearized = linearized;

        self.offsets = self
            .linearized
            .iter()
            .map(|&node| (node, MAX_OFFSET))
            .collect();

        for pass in 0..MAX_PASSES {
            let outcome = self.emit_nodes(&mut io::sink(), Mode::Layout)?;
            log::trace!(
                "CFSA2 offsets pass {}: {} bytes, changed: {}",
                pass,
                outcome.size,
                outcome.changed
            );
            if !outcome.changed {
                return Ok(outcome.size);
            }
        }
        Err(SerializeError::InternalConsistency(format!(
            "CFSA2 offsets did not converge in {} passes",
            MAX_PASSES
        )))
    }

    fn emit<W: Write>(&mut self, out: &mut W) -> Result<usize, SerializeError> {
        let outcome = self.emit_nodes(out, Mode::Emit)?;
        Ok(outcome.size as usize)
    }

    fn emit_nodes<W: Write>(&mut self, out: &mut W, mode: Mode) -> Result<Outcome, SerializeError> {
        let mut outcome = Outcome::default();
        let mut offset = 0u64;

        // Epsilon node at address 0, which terminal arcs also point to.
        offset += self.emit_node_data(out, 0)?;
        let root = match self.fsa.root_node() {
            Some(root) => self.offsets.get(&root).copied().unwrap_or(0),
            None => 0,
        };
        offset += self.emit_arc(out, CFSA2_BIT_LAST, EPSILON_LABEL, root)?;

        for i in 0..self.linearized.len() {
            let node = self.linearized[i];
            let next = self.linearized.get(i + 1).copied();
            let address = u32::try_from(offset).map_err(|_| {
                SerializeError::EncodingOverflow(format!(
                    "state offset {} does not fit in 32 bits",
                    offset
                ))
            })?;

            match mode {
                Mode::Layout => {
                    if self.offsets.insert(node, address) != Some(address) {
                        outcome.changed = true;
                    }
                }
                Mode::Emit => {
                    if self.offsets.get(&node) != Some(&address) {
                        return Err(SerializeError::InternalConsistency(format!(
                            "state {} emitted at {}, laid out at {:?}",
                            node,
                            address,
                            self.offsets.get(&node)
                        )));
                    }
                }
            }

            let count = match &self.numbers {
                Some(numbers) => numbers.get(node).unwrap_or(0),
                None => 0,
            };
            offset += self.emit_node_data(out, count)?;
            offset += self.emit_node_arcs(out, node, next)?;
        }

        outcome.size = offset;
        Ok(outcome)
    }

    fn emit_node_data<W: Write>(&mut self, out: &mut W, count: u32) -> Result<u64, SerializeError> {
        if self.numbers.is_none() {
            return Ok(0);
        }
        self.emit_vint(out, count)
    }

    fn emit_node_arcs<W: Write>(
        &mut self,
        out: &mut W,
        node: NodeIndex,
        next: Option<NodeIndex>,
    ) -> Result<u64, SerializeError> {
        let fsa = self.fsa;
        let mut size = 0;
        for arc in fsa.arcs(node) {
            let mut flags = 0;
            if fsa.is_arc_final(arc) {
                flags |= CFSA2_BIT_FINAL;
            }
            if fsa.next_arc(arc).is_none() {
                flags |= CFSA2_BIT_LAST;
            }

            let address = match fsa.end_node(arc) {
                Some(target) if Some(target) == next => {
                    flags |= CFSA2_BIT_TARGET_NEXT;
                    0
                }
                Some(target) => self.offsets.get(&target).copied().unwrap_or(MAX_OFFSET),
                None => 0,
            };
            size += self.emit_arc(out, flags, fsa.arc_label(arc), address)?;
        }
        Ok(size)
    }

    fn emit_arc<W: Write>(
        &mut self,
        out: &mut W,
        flags: u8,
        label: u8,
        address: u32,
    ) -> Result<u64, SerializeError> {
        let index = self.label_index[usize::from(label)];
        let mut size = if index > 0 {
            write_all(out, &[flags | index])?;
            1
        } else {
            write_all(out, &[flags, label])?;
            2
        };
        if flags & CFSA2_BIT_TARGET_NEXT == 0 {
            size += self.emit_vint(out, address)?;
        }
        Ok(size)
    }

    fn emit_vint<W: Write>(&mut self, out: &mut W, value: u32) -> Result<u64, SerializeError> {
        self.scratch.clear();
        let len = vint::encode(i64::from(value), &mut self.scratch)?;
        write_all(out, &self.scratch)?;
        Ok(len as u64)
    }
}

/// Count arc labels of every reachable state and index the most frequent ones.
///
/// The most frequent label gets the highest index. Ties go to the smaller
/// label.
fn label_table<F: Fsa + ?Sized>(fsa: &F) -> (Vec<u8>, [u8; 256]) {
    let mut counts = [0usize; 256];
    visit_pre_order(fsa, |node| {
        for arc in fsa.arcs(node) {
            counts[usize::from(fsa.arc_label(arc))] += 1;
        }
        true
    });

    let frequent: Vec<u8> = (0..=255u8)
        .filter(|&label| counts[usize::from(label)] > 0)
        .sorted_by_key(|&label| (Reverse(counts[usize::from(label)]), label))
        .take(CFSA2_LABEL_INDEX_SIZE)
        .collect();

    let mut labels = vec![0u8; 1 + frequent.len()];
    let mut index = [0u8; 256];
    for (rank, &label) in frequent.iter().enumerate() {
        let slot = labels.len() - 1 - rank;
        labels[slot] = label;
        index[usize::from(label)] = slot as u8;
    }
    (labels, index)
}

fn place_state<F: Fsa + ?Sized>(
    fsa: &F,
    node: NodeIndex,
    visited: &mut HashSet<NodeIndex>,
    stack: &mut Vec<NodeIndex>,
    linearized: &mut Vec<NodeIndex>,
) {
    linearized.push(node);
    visited.insert(node);
    for arc in fsa.arcs(node) {
        if let Some(target) = fsa.end_node(arc) {
            if !visited.contains(&target) {
                stack.push(target);
            }
        }
    }
}

fn in_link_counts<F: Fsa + ?Sized>(fsa: &F) -> HashMap<NodeIndex, usize> {
    let mut counts = HashMap::new();
    visit_pre_order(fsa, |node| {
        for arc in fsa.arcs(node) {
            if let Some(target) = fsa.end_node(arc) {
                *counts.entry(target).or_insert(0) += 1;
            }
        }
        true
    });
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FsaBuilder;
    use crate::fsa::Cfsa2;

    fn paradigm() -> Vec<String> {
        let consonants = ["b", "c", "d", "f", "g", "k", "l", "m"];
        let mut words = vec![];
        for a in consonants.iter() {
            for b in consonants.iter() {
                let stem = format!("{}a{}", a, b);
                for suffix in ["", "ed", "er", "ing", "s"] {
                    words.push(format!("{}{}", stem, suffix));
                }
            }
        }
        words.sort();
        words
    }

    fn read_words(bytes: Vec<u8>) -> Vec<String> {
        Cfsa2::from_memory(bytes)
            .unwrap()
            .sequences()
            .map(|w| String::from_utf8(w).unwrap())
            .collect()
    }

    #[test]
    fn small_set_bytes() {
        let fsa = FsaBuilder::build(["ab", "b"]).unwrap();
        let bytes = Cfsa2Serializer::new().serialize_to_vec(&fsa).unwrap();

        let mut expected = b"\\fsa\xc6".to_vec();
        expected.extend_from_slice(&[0x00, 0x07]);
        expected.extend_from_slice(&[3, 0, b'a', b'b']);
        expected.extend_from_slice(&[CFSA2_BIT_LAST, b'^', 3]);
        expected.extend_from_slice(&[CFSA2_BIT_TARGET_NEXT | 1]);
        expected.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST | 2, 0]);
        expected.extend_from_slice(&[CFSA2_BIT_FINAL | CFSA2_BIT_LAST | 2, 0]);
        assert_eq!(bytes, expected);
        assert_eq!(read_words(bytes), ["ab", "b"]);
    }

    #[test]
    fn round_trip_with_numbers() {
        let input = paradigm();
        let fsa = FsaBuilder::build(&input).unwrap();
        let bytes = Cfsa2Serializer::new()
            .with_numbers()
            .serialize_to_vec(&fsa)
            .unwrap();

        let read = Cfsa2::from_memory(bytes).unwrap();
        assert!(read.flags().contains(FsaFlag::Numbers));
        let root = read.root_node().unwrap();
        assert_eq!(read.right_language_count(root), Some(input.len() as u32));

        let words: Vec<String> = read
            .sequences()
            .map(|w| String::from_utf8(w).unwrap())
            .collect();
        assert_eq!(words, input);
    }

    #[test]
    fn moving_states_never_grows_output() {
        let input = paradigm();
        let fsa = FsaBuilder::build(&input).unwrap();

        let fixed = LayoutTuning {
            cut_end: 0,
            cut_start: 0,
            ..LayoutTuning::default()
        };
        let plain = Cfsa2Serializer::new()
            .with_tuning(fixed)
            .serialize_to_vec(&fsa)
            .unwrap();
        let tuned = Cfsa2Serializer::new().serialize_to_vec(&fsa).unwrap();
        assert!(tuned.len() <= plain.len());

        let small_steps = LayoutTuning {
            cut_start: 1,
            cut_step: 1,
            cut_end: 10,
            min_inlinks: 1,
        };
        let stepped = Cfsa2Serializer::new()
            .with_tuning(small_steps)
            .serialize_to_vec(&fsa)
            .unwrap();
        assert!(stepped.len() <= plain.len());

        assert_eq!(read_words(plain), input);
        assert_eq!(read_words(tuned), input);
        assert_eq!(read_words(stepped), input);
    }

    #[test]
    fn label_table_is_bounded() {
        // 40 distinct labels, more than the table can index
        let input: Vec<Vec<u8>> = (0x30u8..0x58).map(|b| vec![b'x', b]).collect();
        let fsa = FsaBuilder::build(&input).unwrap();
        let bytes = Cfsa2Serializer::new().serialize_to_vec(&fsa).unwrap();

        let read = Cfsa2::from_memory(bytes).unwrap();
        assert_eq!(read.label_table().len(), CFSA2_LABEL_INDEX_SIZE + 1);
        // every label occurs once; 'x' sorts last and stays literal
        assert!(!read.label_table()[1..].contains(&b'x'));
        let words: Vec<Vec<u8>> = read.sequences().collect();
        assert_eq!(words, input);
    }

    #[test]
    fn most_frequent_label_gets_highest_index() {
        let fsa = FsaBuilder::build(["aa", "ab", "ba", "bb", "ca"]).unwrap();
        let (labels, index) = label_table(&fsa);
        // root: a, b, c; shared {a, b} state and {a} state
        assert_eq!(labels, vec![0, b'c', b'b', b'a']);
        assert_eq!(index[usize::from(b'a')], 3);
        assert_eq!(index[usize::from(b'z')], 0);
    }

    #[test]
    fn separators_are_unsupported() {
        let fsa = FsaBuilder::build(["a"]).unwrap();
        let mut out = vec![];
        let result = Cfsa2Serializer::new()
            .with_flag(FsaFlag::Separators)
            .serialize(&fsa, &mut out);
        match result {
            Err(SerializeError::UnsupportedFlags { format, flags }) => {
                assert_eq!(format, "CFSA2");
                assert_eq!(flags, FsaFlags::of(&[FsaFlag::Separators]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn empty_language() {
        let fsa = FsaBuilder::new().complete().unwrap();
        let bytes = Cfsa2Serializer::new()
            .with_numbers()
            .serialize_to_vec(&fsa)
            .unwrap();
        let read = Cfsa2::from_memory(bytes).unwrap();
        assert_eq!(read.root_node(), None);
        assert_eq!(read.sequences().count(), 0);
    }
}
