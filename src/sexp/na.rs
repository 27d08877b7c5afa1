//! NA sentinel values
//!
//! R marks missing data ("NA") differently in every primitive type: a
//! sentinel integer, one specific NaN bit pattern, a third logical state,
//! and an absent string. The codec writes these sentinels verbatim, so
//! they are defined here once.

/// NA sentinel for integer elements.
pub const NA_INTEGER: i32 = i32::MIN;

/// Bit pattern of the NA double.
///
/// This exact quiet NaN denotes missingness; every other NaN is an
/// ordinary NaN. Little-endian byte layout: `A2 07 00 00 00 00 F0 7F`.
pub const NA_REAL_BITS: u64 = 0x7FF0_0000_0000_07A2;

/// The NA double value.
pub fn na_real() -> f64 {
    f64::from_bits(NA_REAL_BITS)
}

/// Whether `value` is the NA double. Compared bit-for-bit: NaN payloads
/// matter here.
pub fn is_na_real(value: f64) -> bool {
    value.to_bits() == NA_REAL_BITS
}

/// Whether `value` is the NA integer sentinel.
pub fn is_na_integer(value: i32) -> bool {
    value == NA_INTEGER
}

/// Tri-state logical: an R boolean can be missing.
///
/// Wire encoding is one byte per element: 0 = false, 1 = true, 2 = NA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Logical {
    False = 0,
    True = 1,
    Na = 2,
}

impl Logical {
    /// Decode a wire byte. Anything that is not 0 or 1 is missing.
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0 => Logical::False,
            1 => Logical::True,
            _ => Logical::Na,
        }
    }

    /// The wire byte for this value.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Two-state view; `None` when missing.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Logical::False => Some(false),
            Logical::True => Some(true),
            Logical::Na => None,
        }
    }

    /// Whether this value is missing.
    pub fn is_na(self) -> bool {
        matches!(self, Logical::Na)
    }
}

impl From<bool> for Logical {
    fn from(value: bool) -> Self {
        if value {
            Logical::True
        } else {
            Logical::False
        }
    }
}

impl From<Option<bool>> for Logical {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(b) => b.into(),
            None => Logical::Na,
        }
    }
}
