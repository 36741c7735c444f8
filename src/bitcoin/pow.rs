use crate::bitcoin::BlockHeader;
use crate::{Error, Result};
use num::bigint::BigUint;
use num::{One, Zero};

/// Decode a compact "bits" difficulty encoding into the full 256-bit target.
///
/// The compact form packs an exponent into the high byte and a 3-byte mantissa into the
/// rest, MPI style. The sign bit (0x00800000) is invalid for a difficulty target.
pub fn decode_compact_bits(bits: u32) -> Result<BigUint> {
    if bits & 0x00800000 != 0 {
        return Err(Error::HeaderInvalid(format!(
            "difficulty target is negative: {:#010x}",
            bits
        )));
    }
    let exponent = (bits >> 24) as i32;
    let mantissa = BigUint::from(bits & 0x007fffff);
    if exponent <= 3 {
        Ok(mantissa >> (8 * (3 - exponent) as u32))
    } else {
        Ok(mantissa << (8 * (exponent - 3) as u32))
    }
}

/// The amount of work represented by a block mined at the given compact target,
/// defined as 2^256 / (target + 1).
pub fn work_from_compact_bits(bits: u32) -> Result<BigUint> {
    let target = decode_compact_bits(bits)?;
    Ok((BigUint::one() << 256u32) / (target + BigUint::one()))
}

/// The numeric value of a block hash for target comparison.
///
/// Hashes are numbers in big-endian display order, which is the reverse of the wire
/// order the [Hash](crate::bitcoin::Hash) struct carries.
pub fn hash_as_target(hash: &crate::bitcoin::BlockHash) -> BigUint {
    BigUint::from_bytes_le(&hash.raw)
}

/// Check that a header's hash satisfies its declared difficulty target and that the
/// target itself is within the range the network permits.
pub fn check_proof_of_work(header: &BlockHeader, max_target: &BigUint) -> Result<()> {
    let target = decode_compact_bits(header.bits)?;
    if target.is_zero() || &target > max_target {
        return Err(Error::HeaderInvalid(format!(
            "difficulty target out of range: {:#010x}",
            header.bits
        )));
    }
    let hash = header.hash();
    if hash_as_target(&hash) > target {
        return Err(Error::HeaderInvalid(format!(
            "hash is higher than target: {}",
            hash
        )));
    }
    Ok(())
}
