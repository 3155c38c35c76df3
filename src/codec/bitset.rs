// Bitset - Precommit participation carried in block seals
// Principle: a shorter bitset than the roster needs is never guessed at

use rlp::Rlp;

/// Bitset decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitsetError {
    #[error("Malformed RLP: {0}")]
    Rlp(String),

    #[error("Precommit bitset is a list, expected a byte string")]
    NotBytes,

    #[error("Bitset of {available} bytes cannot cover {validators} validators")]
    TooShort { available: usize, validators: usize },
}

impl From<rlp::DecoderError> for BitsetError {
    fn from(e: rlp::DecoderError) -> Self {
        BitsetError::Rlp(e.to_string())
    }
}

/// Number of bytes needed for `validators` bits
pub fn bytes_for(validators: usize) -> usize {
    (validators + 7) / 8
}

/// Indices `0..validators` whose precommit bit is set, ascending
///
/// Bits are read least-significant first within each byte.
pub fn decode_committed(encoded: &[u8], validators: usize) -> Result<Vec<usize>, BitsetError> {
    let rlp = Rlp::new(encoded);
    if rlp.is_list() {
        return Err(BitsetError::NotBytes);
    }
    let bits = rlp.data()?;

    let needed = bytes_for(validators);
    if bits.len() < needed {
        return Err(BitsetError::TooShort {
            available: bits.len(),
            validators,
        });
    }

    Ok((0..validators)
        .filter(|&index| is_set(bits, index))
        .collect())
}

/// Indices `0..validators` whose precommit bit is unset, ascending
pub fn decode_missing(encoded: &[u8], validators: usize) -> Result<Vec<usize>, BitsetError> {
    let committed = decode_committed(encoded, validators)?;
    let mut committed = committed.into_iter().peekable();
    let mut missing = Vec::new();
    for index in 0..validators {
        if committed.peek() == Some(&index) {
            committed.next();
        } else {
            missing.push(index);
        }
    }
    Ok(missing)
}

/// RLP-encode a bitset of `validators` bits with the given indices set
///
/// Indices at or beyond `validators` are ignored.
pub fn encode_bitset(indices: &[usize], validators: usize) -> Vec<u8> {
    let mut bits = vec![0u8; bytes_for(validators)];
    for &index in indices.iter().filter(|&&i| i < validators) {
        bits[index / 8] |= 1 << (index % 8);
    }
    rlp::encode(&bits).to_vec()
}

fn is_set(bits: &[u8], index: usize) -> bool {
    (bits[index / 8] >> (index % 8)) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [usize; 4] = [1, 8, 30, 64];

    fn roundtrip(indices: &[usize], validators: usize) {
        let encoded = encode_bitset(indices, validators);
        assert_eq!(
            decode_committed(&encoded, validators).unwrap(),
            indices.to_vec(),
            "validators = {}",
            validators
        );
    }

    #[test]
    fn test_all_set() {
        for n in SIZES {
            let all: Vec<usize> = (0..n).collect();
            roundtrip(&all, n);
            assert!(decode_missing(&encode_bitset(&all, n), n).unwrap().is_empty());
        }
    }

    #[test]
    fn test_none_set() {
        for n in SIZES {
            roundtrip(&[], n);
            let missing = decode_missing(&encode_bitset(&[], n), n).unwrap();
            assert_eq!(missing, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_alternating() {
        for n in SIZES {
            let even: Vec<usize> = (0..n).step_by(2).collect();
            let odd: Vec<usize> = (1..n).step_by(2).collect();
            roundtrip(&even, n);
            roundtrip(&odd, n);
            assert_eq!(decode_missing(&encode_bitset(&even, n), n).unwrap(), odd);
        }
    }

    #[test]
    fn test_lsb_first() {
        // Raw byte 0b0000_0101 sets validators 0 and 2
        let encoded = rlp::encode(&vec![0b0000_0101u8]).to_vec();
        assert_eq!(decode_committed(&encoded, 8).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_extra_bits_ignored() {
        let encoded = rlp::encode(&vec![0xffu8, 0xff]).to_vec();
        assert_eq!(decode_committed(&encoded, 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_too_short() {
        let encoded = encode_bitset(&[0], 8);
        assert_eq!(
            decode_committed(&encoded, 9),
            Err(BitsetError::TooShort {
                available: 1,
                validators: 9,
            })
        );
    }

    #[test]
    fn test_list_rejected() {
        let mut stream = rlp::RlpStream::new_list(1);
        stream.append(&1u8);
        let encoded = stream.out().to_vec();
        assert_eq!(decode_committed(&encoded, 1), Err(BitsetError::NotBytes));
    }

    #[test]
    fn test_truncated_rlp() {
        // Header announces 4 payload bytes, only 1 present
        let encoded = vec![0x84, 0x01];
        assert!(matches!(decode_committed(&encoded, 8), Err(BitsetError::Rlp(_))));
    }
}
