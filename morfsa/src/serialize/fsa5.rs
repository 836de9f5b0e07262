//! Writer for the fixed goto-length (FSA5) layout.
//!
//! Every arc address uses the same number of bytes, the goto length. It is
//! found by laying the automaton out with a one byte goto length and
//! widening it as long as some address does not fit.
use std::io::{self, Write};

use hashbrown::HashMap;

use super::{milestone, write_all, FsaSerializer, SerializeError};
use crate::constants::{
    DEFAULT_ANNOTATION, DEFAULT_FILLER, EPSILON_LABEL, FSA5_BIT_FINAL, FSA5_BIT_LAST,
    FSA5_BIT_TARGET_NEXT, FSA5_FLAG_BITS, FSA5_MAX_GOTO_LENGTH, FSA5_VERSION, HEADER_SIZE,
};
use crate::fsa::{Fsa, FsaFlag, FsaFlags, FsaHeader};
use crate::traversal::{right_language_counts, visit_pre_order, RightLanguageCounts};
use crate::types::NodeIndex;

const MAX_PASSES: usize = 64;

/// Serializes automata to the FSA5 layout.
#[derive(Debug, Clone)]
pub struct Fsa5Serializer {
    flags: FsaFlags,
    filler: u8,
    annotation: u8,
}

impl Default for Fsa5Serializer {
    fn default() -> Self {
        Fsa5Serializer::new()
    }
}

impl Fsa5Serializer {
    /// A serializer with the default filler and annotation separator.
    pub fn new() -> Fsa5Serializer {
        Fsa5Serializer {
            flags: FsaFlags::empty(),
            filler: DEFAULT_FILLER,
            annotation: DEFAULT_ANNOTATION,
        }
    }

    /// Store the right-language count of every state.
    pub fn with_numbers(self) -> Fsa5Serializer {
        self.with_flag(FsaFlag::Numbers)
    }

    /// Verify that the filler and annotation separator are usable as separators.
    pub fn with_separators(self) -> Fsa5Serializer {
        self.with_flag(FsaFlag::Separators)
    }

    /// Request an arbitrary flag.
    pub fn with_flag(mut self, flag: FsaFlag) -> Fsa5Serializer {
        self.flags.insert(flag);
        self
    }

    /// Set the filler byte written to the header.
    pub fn with_filler(mut self, filler: u8) -> Fsa5Serializer {
        self.filler = filler;
        self
    }

    /// Set the annotation separator written to the header.
    pub fn with_annotation_separator(mut self, annotation: u8) -> Fsa5Serializer {
        self.annotation = annotation;
        self
    }

    fn check_separators<F: Fsa + ?Sized>(&self, fsa: &F) -> Result<(), SerializeError> {
        if self.filler == self.annotation {
            return Err(SerializeError::SeparatorConflict(format!(
                "filler and annotation separator are both {:#04x}",
                self.filler
            )));
        }

        let mut clash = false;
        visit_pre_order(fsa, |node| {
            clash = fsa.arcs(node).any(|arc| fsa.arc_label(arc) == self.filler);
            !clash
        });
        if clash {
            return Err(SerializeError::SeparatorConflict(format!(
                "filler {:#04x} occurs as an arc label",
                self.filler
            )));
        }
        Ok(())
    }
}

impl FsaSerializer for Fsa5Serializer {
    fn format_name(&self) -> &'static str {
        "FSA5"
    }

    fn supported_flags(&self) -> FsaFlags {
        FsaFlags::of(&FsaFlag::ALL)
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
        if self.flags.contains(FsaFlag::Separators) {
            self.check_separators(fsa)?;
        }

        let mut pass = Fsa5Pass::new(fsa, self.flags.contains(FsaFlag::Numbers));
        progress(milestone::PREPARED);

        pass.compute_layout()?;
        progress(milestone::LAYOUT);

        FsaHeader::new(FSA5_VERSION)
            .write(out)
            .map_err(SerializeError::Io)?;
        let packed = (pass.node_data_length << 4 | pass.goto_length) as u8;
        write_all(out, &[self.filler, self.annotation, packed])?;
        progress(milestone::HEADER);

        let body = pass.emit(out)?;
        progress(milestone::ARCS);

        out.flush().map_err(SerializeError::Io)?;
        progress(milestone::DONE);

        let written = HEADER_SIZE + 3 + body;
        log::debug!(
            "FSA5: {} states, goto length {}, node data length {}, {} bytes",
            pass.linearized.len(),
            pass.goto_length,
            pass.node_data_length,
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
    overflow: bool,
}

/// State of one serialize call.
struct Fsa5Pass<'a, F: Fsa + ?Sized> {
    fsa: &'a F,
    linearized: Vec<NodeIndex>,
    offsets: HashMap<NodeIndex, u64>,
    numbers: Option<RightLanguageCounts>,
    node_data_length: usize,
    goto_length: usize,
}

impl<'a, F: Fsa + ?Sized> Fsa5Pass<'a, F> {
    fn new(fsa: &'a F, with_numbers: bool) -> Fsa5Pass<'a, F> {
        // Depth first with the last arc's target popped first, so it can
        // often be placed right after its parent.
        let mut linearized = Vec::new();
        visit_pre_order(fsa, |node| {
            linearized.push(node);
            true
        });

        let (numbers, node_data_length) = if with_numbers {
            let counts = right_language_counts(fsa);
            let root_count = fsa
                .root_node()
                .and_then(|root| counts.get(root))
                .unwrap_or(0);
            let length = bytes_needed(u64::from(root_count)).max(1);
            (Some(counts), length)
        } else {
            (None, 0)
        };

        Fsa5Pass {
            fsa,
            linearized,
            offsets: HashMap::new(),
            numbers,
            node_data_length,
            goto_length: 1,
        }
    }

    fn compute_layout(&mut self) -> Result<(), SerializeError> {
        loop {
            let mut overflow = false;
            for pass in 0..MAX_PASSES {
                let outcome = self.emit_nodes(&mut io::sink(), Mode::Layout)?;
                log::trace!(
                    "FSA5 layout pass {} at goto length {}: {} bytes, changed: {}, overflow: {}",
                    pass,
                    self.goto_length,
                    outcome.size,
                    outcome.changed,
                    outcome.overflow
                );
                if outcome.overflow {
                    overflow = true;
                    break;
                }
                if !outcome.changed {
                    log::debug!("FSA5 goto length {}", self.goto_length);
                    return Ok(());
                }
            }

            if !overflow {
                return Err(SerializeError::InternalConsistency(format!(
                    "FSA5 offsets did not converge in {} passes",
                    MAX_PASSES
                )));
            }
            if self.goto_length == FSA5_MAX_GOTO_LENGTH {
                return Err(SerializeError::EncodingOverflow(format!(
                    "addresses do not fit in {} bytes",
                    FSA5_MAX_GOTO_LENGTH
                )));
            }
            self.goto_length += 1;
        }
    }

    fn emit<W: Write>(&mut self, out: &mut W) -> Result<usize, SerializeError> {
        let outcome = self.emit_nodes(out, Mode::Emit)?;
        if outcome.overflow {
            return Err(SerializeError::InternalConsistency(
                "FSA5 address overflow in the emission pass".to_string(),
            ));
        }
        Ok(outcome.size as usize)
    }

    fn emit_nodes<W: Write>(&mut self, out: &mut W, mode: Mode) -> Result<Outcome, SerializeError> {
        let mut outcome = Outcome::default();
        let mut offset = 0u64;

        // Dummy node at address 0, the target of terminal arcs.
        offset += self.emit_node_data(out, 0)?;
        offset += self.emit_arc(out, 0, 0, 0, &mut outcome)?;

        // Epsilon node. The root is always laid out first.
        offset += self.emit_node_data(out, 0)?;
        offset += match self.fsa.root_node() {
            Some(_) => {
                write_all(out, &[EPSILON_LABEL, FSA5_BIT_LAST | FSA5_BIT_TARGET_NEXT])?;
                2
            }
            None => self.emit_arc(out, EPSILON_LABEL, FSA5_BIT_LAST, 0, &mut outcome)?,
        };

        for i in 0..self.linearized.len() {
            let node = self.linearized[i];
            let next = self.linearized.get(i + 1).copied();
            match mode {
                Mode::Layout => {
                    if self.offsets.insert(node, offset) != Some(offset) {
                        outcome.changed = true;
                    }
                }
                Mode::Emit => {
                    if self.offsets.get(&node) != Some(&offset) {
                        return Err(SerializeError::InternalConsistency(format!(
                            "state {} emitted at {}, laid out at {:?}",
                            node,
                            offset,
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
            offset += self.emit_node_arcs(out, node, next, &mut outcome)?;
        }

        outcome.size = offset;
        Ok(outcome)
    }

    fn emit_node_data<W: Write>(&self, out: &mut W, count: u32) -> Result<u64, SerializeError> {
        if self.node_data_length > 0 {
            let bytes = u64::from(count).to_le_bytes();
            write_all(out, &bytes[..self.node_data_length])?;
        }
        Ok(self.node_data_length as u64)
    }

    fn emit_node_arcs<W: Write>(
        &self,
        out: &mut W,
        node: NodeIndex,
        next: Option<NodeIndex>,
        outcome: &mut Outcome,
    ) -> Result<u64, SerializeError> {
        let fsa = self.fsa;
        let mut size = 0;
        for arc in fsa.arcs(node) {
            let label = fsa.arc_label(arc);
            let last = fsa.next_arc(arc).is_none();

            let mut flags = 0;
            if fsa.is_arc_final(arc) {
                flags |= FSA5_BIT_FINAL;
            }
            if last {
                flags |= FSA5_BIT_LAST;
            }

            size += match fsa.end_node(arc) {
                Some(target) if last && Some(target) == next => {
                    write_all(out, &[label, flags | FSA5_BIT_TARGET_NEXT])?;
                    2
                }
                Some(target) => {
                    // not yet placed in the first layout pass
                    let address = self.offsets.get(&target).copied().unwrap_or(0);
                    self.emit_arc(out, label, flags, address, outcome)?
                }
                None => self.emit_arc(out, label, flags, 0, outcome)?,
            };
        }
        Ok(size)
    }

    fn emit_arc<W: Write>(
        &self,
        out: &mut W,
        label: u8,
        flags: u8,
        address: u64,
        outcome: &mut Outcome,
    ) -> Result<u64, SerializeError> {
        let combined = address << FSA5_FLAG_BITS | u64::from(flags);
        if self.goto_length < 8 && combined >> (8 * self.goto_length) != 0 {
            outcome.overflow = true;
        }

        let bytes = combined.to_le_bytes();
        write_all(out, &[label])?;
        write_all(out, &bytes[..self.goto_length])?;
        Ok(1 + self.goto_length as u64)
    }
}

fn bytes_needed(mut value: u64) -> usize {
    let mut n = 0;
    while value > 0 {
        n += 1;
        value >>= 8;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FsaBuilder;
    use crate::fsa::Fsa5;

    #[test]
    fn small_set_bytes() {
        let fsa = FsaBuilder::build(["ab", "b"]).unwrap();
        let bytes = Fsa5Serializer::new().serialize_to_vec(&fsa).unwrap();

        let mut expected = b"\\fsa\x05_+\x01".to_vec();
        expected.extend_from_slice(&[0, 0]);
        expected.extend_from_slice(&[b'^', FSA5_BIT_LAST | FSA5_BIT_TARGET_NEXT]);
        expected.extend_from_slice(&[b'a', 8 << 3]);
        expected.extend_from_slice(&[b'b', FSA5_BIT_FINAL | FSA5_BIT_LAST]);
        expected.extend_from_slice(&[b'b', FSA5_BIT_FINAL | FSA5_BIT_LAST]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn round_trip_with_numbers() {
        let input = ["a", "ab", "abc", "b"];
        let fsa = FsaBuilder::build(input).unwrap();
        let bytes = Fsa5Serializer::new()
            .with_numbers()
            .serialize_to_vec(&fsa)
            .unwrap();

        let read = Fsa5::from_memory(bytes).unwrap();
        assert_eq!(read.node_data_length(), 1);
        assert!(read.flags().contains(FsaFlag::Numbers));
        let root = read.root_node().unwrap();
        assert_eq!(read.right_language_count(root), Some(4));

        let words: Vec<Vec<u8>> = read.sequences().collect();
        let expected: Vec<Vec<u8>> = input.iter().map(|w| w.as_bytes().to_vec()).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn goto_length_grows() {
        let mut input: Vec<String> = (0..400u32).map(|i| (i * i * 7919).to_string()).collect();
        input.sort();
        input.dedup();
        let fsa = FsaBuilder::build(&input).unwrap();

        let bytes = Fsa5Serializer::new().serialize_to_vec(&fsa).unwrap();
        let read = Fsa5::from_memory(bytes).unwrap();
        assert!(read.goto_length() >= 2);

        let words: Vec<String> = read
            .sequences()
            .map(|w| String::from_utf8(w).unwrap())
            .collect();
        assert_eq!(words, input);
    }

    #[test]
    fn empty_language() {
        let fsa = FsaBuilder::new().complete().unwrap();
        let bytes = Fsa5Serializer::new()
            .with_numbers()
            .serialize_to_vec(&fsa)
            .unwrap();
        let read = Fsa5::from_memory(bytes).unwrap();
        assert_eq!(read.root_node(), None);
        assert_eq!(read.sequences().count(), 0);
    }

    #[test]
    fn separators() {
        let fsa = FsaBuilder::build(["a+b", "c"]).unwrap();
        assert!(Fsa5Serializer::new()
            .with_separators()
            .serialize_to_vec(&fsa)
            .is_ok());

        let result = Fsa5Serializer::new()
            .with_separators()
            .with_filler(b'+')
            .serialize_to_vec(&fsa);
        assert!(matches!(result, Err(SerializeError::SeparatorConflict(_))));

        let result = Fsa5Serializer::new()
            .with_separators()
            .with_filler(b'x')
            .with_annotation_separator(b'x')
            .serialize_to_vec(&fsa);
        assert!(matches!(result, Err(SerializeError::SeparatorConflict(_))));
    }

    #[test]
    fn progress_is_reported() {
        let fsa = FsaBuilder::build(["x", "y"]).unwrap();
        let mut seen = vec![];
        let mut out = vec![];
        let written = Fsa5Serializer::new()
            .serialize_with_progress(&fsa, &mut out, &mut |p| seen.push(p))
            .unwrap();
        assert_eq!(written, out.len());
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
