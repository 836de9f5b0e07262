//! Variable-length integers.
//!
//! Seven bits per byte, least significant group first. Every byte except
//! the last has its high bit set.
use crate::fsa::FsaError;
use crate::serialize::SerializeError;

/// The largest value that can be stored as a node count or offset.
pub const MAX_VINT_VALUE: i64 = u32::MAX as i64;

/// Upper bound on the encoded size of a value.
pub const MAX_VINT_LENGTH: usize = 5;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;

fn check(value: i64) -> Result<u32, SerializeError> {
    if !(0..=MAX_VINT_VALUE).contains(&value) {
        return Err(SerializeError::EncodingOverflow(format!(
            "cannot v-code {}, value must be within 0..={}",
            value, MAX_VINT_VALUE
        )));
    }
    Ok(value as u32)
}

/// Append the encoding of `value` to `out`, returning the number of bytes written.
pub fn encode(value: i64, out: &mut Vec<u8>) -> Result<usize, SerializeError> {
    let mut value = check(value)?;
    let start = out.len();
    while value > u32::from(PAYLOAD) {
        out.push(CONTINUATION | (value as u8 & PAYLOAD));
        value >>= 7;
    }
    out.push(value as u8);
    Ok(out.len() - start)
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: i64) -> Result<usize, SerializeError> {
    let mut value = check(value)?;
    let mut len = 1;
    while value > u32::from(PAYLOAD) {
        value >>= 7;
        len += 1;
    }
    Ok(len)
}

/// Decode the value starting at `pos`, returning it with its encoded length.
pub fn decode(buf: &[u8], pos: usize) -> Result<(u32, usize), FsaError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut len = 0;
    loop {
        let b = *buf.get(pos + len).ok_or(FsaError::TruncatedStream)?;
        len += 1;
        value |= u64::from(b & PAYLOAD) << shift;
        if b & CONTINUATION == 0 {
            break;
        }
        shift += 7;
        if len == MAX_VINT_LENGTH {
            return Err(FsaError::MalformedStream(format!(
                "v-coded integer at {} is longer than {} bytes",
                pos, MAX_VINT_LENGTH
            )));
        }
    }
    if value > u64::from(u32::MAX) {
        return Err(FsaError::MalformedStream(format!(
            "v-coded integer at {} does not fit in 32 bits",
            pos
        )));
    }
    Ok((value as u32, len))
}

/// Decode without validation. The caller guarantees a well-formed buffer.
#[inline]
pub(crate) fn read(buf: &[u8], mut pos: usize) -> u32 {
    let mut b = buf[pos];
    let mut value = u32::from(b & PAYLOAD);
    let mut shift = 7;
    while b & CONTINUATION != 0 {
        pos += 1;
        b = buf[pos];
        value |= u32::from(b & PAYLOAD) << shift;
        shift += 7;
    }
    value
}

/// Position just past the value starting at `pos`.
#[inline]
pub(crate) fn skip(buf: &[u8], mut pos: usize) -> usize {
    while buf[pos] & CONTINUATION != 0 {
        pos += 1;
    }
    pos + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let values = [
            0i64,
            1,
            0x7f,
            0x80,
            0x3fff,
            0x4000,
            1_000_000,
            i64::from(i32::MAX),
            MAX_VINT_VALUE,
        ];
        for &v in values.iter() {
            let mut buf = vec![0xaa];
            let n = encode(v, &mut buf).unwrap();
            assert_eq!(n, buf.len() - 1);
            assert_eq!(n, encoded_len(v).unwrap());
            assert_eq!(decode(&buf, 1).unwrap(), (v as u32, n));
            assert_eq!(read(&buf, 1), v as u32);
            assert_eq!(skip(&buf, 1), buf.len());
        }
    }

    #[test]
    fn known_encodings() {
        let mut buf = vec![];
        encode(0, &mut buf).unwrap();
        encode(0x80, &mut buf).unwrap();
        encode(300, &mut buf).unwrap();
        assert_eq!(buf, vec![0x00, 0x80, 0x01, 0xac, 0x02]);
        assert_eq!(encoded_len(MAX_VINT_VALUE).unwrap(), MAX_VINT_LENGTH);
    }

    #[test]
    fn negative_overflows() {
        let mut buf = vec![];
        assert!(matches!(
            encode(-1, &mut buf),
            Err(SerializeError::EncodingOverflow(_))
        ));
        assert!(buf.is_empty());
        assert!(matches!(
            encoded_len(MAX_VINT_VALUE + 1),
            Err(SerializeError::EncodingOverflow(_))
        ));
    }

    #[test]
    fn truncated() {
        assert!(matches!(decode(&[0x80, 0x80], 0), Err(FsaError::TruncatedStream)));
        assert!(matches!(decode(&[], 0), Err(FsaError::TruncatedStream)));
    }

    #[test]
    fn too_long() {
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01], 0),
            Err(FsaError::MalformedStream(_))
        ));
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0x7f], 0),
            Err(FsaError::MalformedStream(_))
        ));
    }
}
