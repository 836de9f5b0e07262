use std::fmt;

use serde::{Serialize, Serializer};

/// Capabilities an automaton stream declares or a serializer can honor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsaFlag {
    /// Arcs are variable-size.
    Flexible,
    /// The last arc of a state is marked with a bit.
    StopBit,
    /// Arcs may point at the node that immediately follows them.
    NextBit,
    /// Every state stores the size of its right language.
    Numbers,
    /// The stream declares a filler and an annotation separator byte.
    Separators,
}

impl FsaFlag {
    /// All flags, in mask bit order.
    pub const ALL: [FsaFlag; 5] = [
        FsaFlag::Flexible,
        FsaFlag::StopBit,
        FsaFlag::NextBit,
        FsaFlag::Numbers,
        FsaFlag::Separators,
    ];

    /// The bit this flag occupies in a flag mask.
    #[inline(always)]
    pub const fn bits(self) -> u16 {
        match self {
            FsaFlag::Flexible => 1 << 0,
            FsaFlag::StopBit => 1 << 1,
            FsaFlag::NextBit => 1 << 2,
            FsaFlag::Numbers => 1 << 8,
            FsaFlag::Separators => 1 << 9,
        }
    }

    /// Lower-case name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            FsaFlag::Flexible => "flexible",
            FsaFlag::StopBit => "stopbit",
            FsaFlag::NextBit => "nextbit",
            FsaFlag::Numbers => "numbers",
            FsaFlag::Separators => "separators",
        }
    }
}

/// A set of [`FsaFlag`]s, stored as the 16-bit mask written to CFSA2 streams.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FsaFlags(u16);

impl FsaFlags {
    /// No flags.
    pub const fn empty() -> FsaFlags {
        FsaFlags(0)
    }

    /// Build a set from individual flags.
    pub fn of(flags: &[FsaFlag]) -> FsaFlags {
        flags.iter().fold(FsaFlags::empty(), |acc, f| acc.with(*f))
    }

    /// Decode a mask, ignoring bits no flag uses.
    pub fn from_mask(mask: u16) -> FsaFlags {
        let known = FsaFlag::ALL.iter().fold(0, |acc, f| acc | f.bits());
        FsaFlags(mask & known)
    }

    /// The mask as written to a stream.
    #[inline(always)]
    pub fn mask(self) -> u16 {
        self.0
    }

    /// Whether `flag` is in the set.
    #[inline(always)]
    pub fn contains(self, flag: FsaFlag) -> bool {
        self.0 & flag.bits() != 0
    }

    /// A copy of this set with `flag` added.
    #[inline(always)]
    pub fn with(self, flag: FsaFlag) -> FsaFlags {
        FsaFlags(self.0 | flag.bits())
    }

    /// Add `flag` in place.
    #[inline(always)]
    pub fn insert(&mut self, flag: FsaFlag) {
        self.0 |= flag.bits();
    }

    /// Flags in `self` that are missing from `other`.
    #[inline(always)]
    pub fn difference(self, other: FsaFlags) -> FsaFlags {
        FsaFlags(self.0 & !other.0)
    }

    /// Whether the set is empty.
    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the flags in the set.
    pub fn iter(self) -> impl Iterator<Item = FsaFlag> {
        FsaFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl fmt::Debug for FsaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for FsaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(FsaFlag::name).collect();
        write!(f, "{}", names.join(","))
    }
}

impl Serialize for FsaFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(FsaFlag::name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_round_trip() {
        let flags = FsaFlags::of(&[FsaFlag::Flexible, FsaFlag::NextBit, FsaFlag::Numbers]);
        assert_eq!(flags.mask(), 0b1_0000_0101);
        assert_eq!(FsaFlags::from_mask(flags.mask()), flags);
        assert!(flags.contains(FsaFlag::Numbers));
        assert!(!flags.contains(FsaFlag::Separators));
    }

    #[test]
    fn unknown_bits_are_dropped() {
        // bit 3 used to mark tail-compressed automata, nothing reads it now
        assert_eq!(FsaFlags::from_mask(1 << 3), FsaFlags::empty());
    }

    #[test]
    fn difference() {
        let wanted = FsaFlags::of(&[FsaFlag::Numbers, FsaFlag::Separators]);
        let supported = FsaFlags::of(&[FsaFlag::Numbers, FsaFlag::Flexible]);
        let missing = wanted.difference(supported);
        assert_eq!(missing.iter().collect::<Vec<_>>(), vec![FsaFlag::Separators]);
        assert_eq!(format!("{}", wanted), "numbers,separators");
    }
}
