//! Dotted-quad text to 32-bit ordinal conversion.
//!
//! Two decoders share one mapping, `ordinal = Σ octet[i] << 8 * (3 - i)`:
//!
//! - [`encode`] is the unchecked fast path. It never fails and never
//!   allocates; its output is only meaningful for well-formed input.
//! - [`decode`] accepts exactly four decimal octets in `0..=255` and reports
//!   anything else as a [`MalformedAddress`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a line was rejected by the strict decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedAddress {
    #[error("empty address")]
    Empty,

    #[error("expected 4 octets, found {0}")]
    WrongOctetCount(usize),

    #[error("octet {octet} is empty")]
    EmptyOctet { octet: usize },

    #[error("invalid byte {byte:#04x} in octet {octet}")]
    InvalidDigit { octet: usize, byte: u8 },

    #[error("octet {octet} is out of range")]
    OctetOutOfRange { octet: usize },
}

/// How lines are turned into ordinals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPolicy {
    /// Use [`encode`]: malformed lines are counted under whatever ordinal
    /// they happen to produce.
    #[default]
    Lenient,
    /// Use [`decode`]: malformed lines are rejected and not counted.
    Strict,
}

impl AddressPolicy {
    /// Convert one trimmed, non-empty line under this policy.
    #[inline]
    pub fn ordinal(self, line: &[u8]) -> Result<u32, MalformedAddress> {
        match self {
            Self::Lenient => Ok(encode_bytes(line)),
            Self::Strict => decode_bytes(line),
        }
    }
}

/// Unchecked conversion of a dotted-quad address.
///
/// Digits accumulate as `value * 10 + (byte - '0')` with wrapping arithmetic
/// and no range check. Octets past the fourth contribute nothing.
#[inline]
pub fn encode(address: &str) -> u32 {
    encode_bytes(address.as_bytes())
}

/// Byte-slice form of [`encode`].
#[inline]
pub fn encode_bytes(address: &[u8]) -> u32 {
    let mut result = 0u32;
    let mut value = 0u32;
    let mut octet = 0u32;

    for &byte in address {
        if byte == b'.' {
            result = result.wrapping_add(place(value, octet));
            octet = octet.saturating_add(1);
            value = 0;
        } else {
            let digit = u32::from(byte).wrapping_sub(u32::from(b'0'));
            value = value.wrapping_mul(10).wrapping_add(digit);
        }
    }

    result.wrapping_add(place(value, octet))
}

#[inline]
fn place(value: u32, octet: u32) -> u32 {
    match octet {
        0..=3 => value << (8 * (3 - octet)),
        _ => 0,
    }
}

/// Validating conversion of a dotted-quad address.
pub fn decode(address: &str) -> Result<u32, MalformedAddress> {
    decode_bytes(address.as_bytes())
}

/// Byte-slice form of [`decode`].
pub fn decode_bytes(address: &[u8]) -> Result<u32, MalformedAddress> {
    if address.is_empty() {
        return Err(MalformedAddress::Empty);
    }

    let octets = address.iter().filter(|&&b| b == b'.').count() + 1;
    if octets != 4 {
        return Err(MalformedAddress::WrongOctetCount(octets));
    }

    let mut result = 0u32;
    for (octet, part) in address.split(|&b| b == b'.').enumerate() {
        if part.is_empty() {
            return Err(MalformedAddress::EmptyOctet { octet });
        }

        let mut value = 0u32;
        for &byte in part {
            if !byte.is_ascii_digit() {
                return Err(MalformedAddress::InvalidDigit { octet, byte });
            }
            value = value.saturating_mul(10).saturating_add(u32::from(byte - b'0'));
        }

        if part.len() > 3 || value > 255 {
            return Err(MalformedAddress::OctetOutOfRange { octet });
        }

        result = (result << 8) | value;
    }

    Ok(result)
}
