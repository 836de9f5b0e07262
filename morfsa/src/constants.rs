pub const FSA_MAGIC: [u8; 4] = [b'\\', b'f', b's', b'a'];
pub const HEADER_SIZE: usize = FSA_MAGIC.len() + 1;

pub const FSA5_VERSION: u8 = 5;
pub const CFSA2_VERSION: u8 = 0xc6;

pub const EPSILON_LABEL: u8 = b'^';
pub const DEFAULT_FILLER: u8 = b'_';
pub const DEFAULT_ANNOTATION: u8 = b'+';

// Builder output: [flags][label][u32 big-endian target].
pub const CONSTANT_ARC_SIZE: usize = 6;
pub const CONSTANT_FLAGS_OFFSET: usize = 0;
pub const CONSTANT_LABEL_OFFSET: usize = 1;
pub const CONSTANT_ADDRESS_OFFSET: usize = 2;
pub const CONSTANT_BIT_LAST: u8 = 1 << 0;
pub const CONSTANT_BIT_FINAL: u8 = 1 << 1;

pub const FSA5_BIT_FINAL: u8 = 1 << 0;
pub const FSA5_BIT_LAST: u8 = 1 << 1;
pub const FSA5_BIT_TARGET_NEXT: u8 = 1 << 2;
pub const FSA5_FLAG_BITS: u32 = 3;
pub const FSA5_MAX_GOTO_LENGTH: usize = 8;

pub const CFSA2_BIT_TARGET_NEXT: u8 = 1 << 7;
pub const CFSA2_BIT_LAST: u8 = 1 << 6;
pub const CFSA2_BIT_FINAL: u8 = 1 << 5;
pub const CFSA2_LABEL_INDEX_BITS: u32 = 5;
pub const CFSA2_LABEL_INDEX_MASK: u8 = (1 << CFSA2_LABEL_INDEX_BITS) - 1;
pub const CFSA2_LABEL_INDEX_SIZE: usize = (1 << CFSA2_LABEL_INDEX_BITS) - 1;

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn test_CONSTANT_ARC_SIZE() {
        use std::mem;

        let c = 2 * mem::size_of::<u8>() + mem::size_of::<u32>();

        assert!(CONSTANT_ARC_SIZE == c);
        assert!(CONSTANT_ADDRESS_OFFSET + mem::size_of::<u32>() == CONSTANT_ARC_SIZE);
    }

    #[test]
    fn test_FSA5_flags_fit_flag_bits() {
        let all = FSA5_BIT_FINAL | FSA5_BIT_LAST | FSA5_BIT_TARGET_NEXT;
        assert!(u32::from(all) < 1 << FSA5_FLAG_BITS);
    }

    #[test]
    fn test_CFSA2_flags_do_not_overlap_label_index() {
        let all = CFSA2_BIT_FINAL | CFSA2_BIT_LAST | CFSA2_BIT_TARGET_NEXT;
        assert_eq!(all & CFSA2_LABEL_INDEX_MASK, 0);
        assert_eq!(CFSA2_LABEL_INDEX_SIZE, CFSA2_LABEL_INDEX_MASK as usize);
    }
}
