//! Compaction of automata into their binary layouts.
//!
//! A serializer holds only configuration. All per-call state lives inside
//! the `serialize` call, so one serializer can be reused for any number of
//! automata.
mod cfsa2;
mod error;
mod fsa5;

use std::io::Write;

pub use self::cfsa2::Cfsa2Serializer;
pub use self::error::SerializeError;
pub use self::fsa5::Fsa5Serializer;

use crate::fsa::{Fsa, FsaFlags};

/// Progress milestones, in percent.
pub(crate) mod milestone {
    pub const PREPARED: u8 = 10;
    pub const LAYOUT: u8 = 60;
    pub const HEADER: u8 = 70;
    pub const ARCS: u8 = 95;
    pub const DONE: u8 = 100;
}

/// Writes an automaton in one binary layout.
pub trait FsaSerializer {
    /// Short name of the layout, for messages.
    fn format_name(&self) -> &'static str;

    /// Flags the layout can represent.
    fn supported_flags(&self) -> FsaFlags;

    /// Flags this serializer has been configured to produce.
    fn requested_flags(&self) -> FsaFlags;

    /// Serialize `fsa` into `out`, reporting progress from 0 to 100.
    ///
    /// Returns the number of bytes written. Nothing is written if the
    /// configuration is rejected.
    fn serialize_with_progress<F, W>(
        &self,
        fsa: &F,
        out: &mut W,
        progress: &mut dyn FnMut(u8),
    ) -> Result<usize, SerializeError>
    where
        F: Fsa + ?Sized,
        W: Write;

    /// Serialize `fsa` into `out`, returning the number of bytes written.
    fn serialize<F, W>(&self, fsa: &F, out: &mut W) -> Result<usize, SerializeError>
    where
        F: Fsa + ?Sized,
        W: Write,
    {
        self.serialize_with_progress(fsa, out, &mut |_| {})
    }

    /// Serialize `fsa` into a new buffer.
    fn serialize_to_vec<F>(&self, fsa: &F) -> Result<Vec<u8>, SerializeError>
    where
        F: Fsa + ?Sized,
    {
        let mut out = Vec::new();
        self.serialize(fsa, &mut out)?;
        Ok(out)
    }

    /// Fail if any requested flag is outside the supported set.
    fn check_flags(&self) -> Result<(), SerializeError> {
        let unsupported = self.requested_flags().difference(self.supported_flags());
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(SerializeError::UnsupportedFlags {
                format: self.format_name(),
                flags: unsupported,
            })
        }
    }
}

/// Knobs for the CFSA2 node layout search.
///
/// States with many incoming arcs are moved to the front of the stream so
/// their addresses take fewer bytes. The search tries moving `cut_start`,
/// `cut_start + cut_step`, ... up to `cut_end` of the candidates and keeps
/// the smallest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTuning {
    /// Candidates moved in the first trial.
    pub cut_start: usize,
    /// Increment between trials.
    pub cut_step: usize,
    /// Upper bound on the number of moved candidates.
    pub cut_end: usize,
    /// A state needs more incoming arcs than this to be a candidate.
    pub min_inlinks: usize,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        LayoutTuning {
            cut_start: 25,
            cut_step: 25,
            cut_end: 150,
            min_inlinks: 2,
        }
    }
}

pub(crate) fn write_all<W: Write>(out: &mut W, bytes: &[u8]) -> Result<(), SerializeError> {
    out.write_all(bytes).map_err(SerializeError::Io)
}
