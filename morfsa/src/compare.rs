//! Unsigned lexicographic ordering of byte sequences.
//!
//! The builder relies on this ordering to verify its input. Two
//! implementations exist and must always agree: a portable byte-at-a-time
//! loop and a wide variant that compares eight bytes per step. The
//! `wide-compare` feature decides which one [`compare_bytes`] uses.
use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};

const WORD: usize = std::mem::size_of::<u64>();

/// Compare two byte sequences, one byte at a time.
pub fn compare_bytes_portable(a: &[u8], b: &[u8]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Compare two byte sequences, eight bytes at a time.
///
/// Words are read big-endian so that integer order matches byte order.
pub fn compare_bytes_wide(a: &[u8], b: &[u8]) -> Ordering {
    let common = a.len().min(b.len());
    let words = common / WORD;

    for i in 0..words {
        let start = i * WORD;
        let x = BigEndian::read_u64(&a[start..start + WORD]);
        let y = BigEndian::read_u64(&b[start..start + WORD]);
        if x != y {
            return x.cmp(&y);
        }
    }

    let tail = words * WORD;
    compare_bytes_portable(&a[tail..], &b[tail..])
}

/// Compare two byte sequences with the implementation selected at build time.
#[cfg(feature = "wide-compare")]
#[inline(always)]
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    compare_bytes_wide(a, b)
}

/// Compare two byte sequences with the implementation selected at build time.
#[cfg(not(feature = "wide-compare"))]
#[inline(always)]
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    compare_bytes_portable(a, b)
}

/// Length of the longest common prefix of two byte sequences.
pub fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0, 0],
            vec![1],
            vec![0x7f],
            vec![0x80],
            vec![0xff],
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00],
            b"abcdefgh".to_vec(),
            b"abcdefgi".to_vec(),
            b"abcdefgh0".to_vec(),
            b"abcdefghijklmnopq".to_vec(),
            b"abcdefghijklmnopr".to_vec(),
            b"abcdefghijklmnop".to_vec(),
            b"abcdefgh\x80ijklmnop".to_vec(),
            b"abcdefgh\x7fijklmnop".to_vec(),
        ];

        // Differences at every position of a 17 byte sequence.
        let base: Vec<u8> = (0u8..17).map(|x| x.wrapping_mul(37)).collect();
        for i in 0..base.len() {
            let mut up = base.clone();
            up[i] = up[i].wrapping_add(1);
            let mut down = base.clone();
            down[i] = down[i].wrapping_sub(1);
            out.push(up);
            out.push(down);
            out.push(base[..i].to_vec());
        }
        out.push(base);
        out
    }

    #[test]
    fn wide_and_portable_agree() {
        let samples = samples();
        for a in &samples {
            for b in &samples {
                assert_eq!(
                    compare_bytes_portable(a, b),
                    compare_bytes_wide(a, b),
                    "{:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn matches_slice_ordering() {
        let samples = samples();
        for a in &samples {
            for b in &samples {
                assert_eq!(compare_bytes(a, b), a.as_slice().cmp(b.as_slice()));
            }
        }
    }

    #[test]
    fn bytes_are_unsigned() {
        assert_eq!(compare_bytes_portable(&[0x80], &[0x7f]), Ordering::Greater);
        assert_eq!(compare_bytes_wide(&[0x80; 9], &[0x7f; 9]), Ordering::Greater);
    }

    #[test]
    fn empty_sorts_first() {
        assert_eq!(compare_bytes_wide(&[], &[]), Ordering::Equal);
        assert_eq!(compare_bytes_wide(&[], &[0]), Ordering::Less);
        assert_eq!(compare_bytes_portable(&[0], &[]), Ordering::Greater);
    }

    #[test]
    fn common_prefix() {
        assert_eq!(common_prefix_length(b"abc", b"abd"), 2);
        assert_eq!(common_prefix_length(b"abc", b"abc"), 3);
        assert_eq!(common_prefix_length(b"", b"abc"), 0);
        assert_eq!(common_prefix_length(b"ab", b"abc"), 2);
    }
}
