//! Fixed-width two-state bit vectors used as the value of every signal.
//!
//! A [`BitValue`] has a size fixed at construction. The distinguished null
//! value (size 0) stands for "undefined" and is what every failing
//! operation returns: mismatched sizes, bad ranges and parse errors never
//! panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// Number of bits packed per `u64` word.
const BITS_PER_WORD: u32 = 64;

/// A vector of bits packed into `u64` words, index 0 being the LSB.
///
/// Bits above `size` in the last word are always kept clear so that the
/// derived equality compares values only. Deserialization restores that
/// invariant: stored words beyond `size` are masked, and a word count that
/// does not match `size` yields the null value.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBitValue")]
pub struct BitValue {
    size: u32,
    /// Packed storage: 1 bit per value, 64 values per u64.
    data: Vec<u64>,
}

/// Unchecked serialized form of a [`BitValue`].
#[derive(Deserialize)]
struct RawBitValue {
    size: u32,
    data: Vec<u64>,
}

impl From<RawBitValue> for BitValue {
    fn from(raw: RawBitValue) -> Self {
        if raw.data.len() != word_count(raw.size) {
            return Self::null();
        }
        let mut value = Self {
            size: raw.size,
            data: raw.data,
        };
        value.clear_padding();
        value
    }
}

/// Addressing of a slice of a [`BitValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitRange {
    /// The whole value.
    All,
    /// A single bit.
    Bit(u32),
    /// An inclusive range from `msb` down to `lsb`.
    Span {
        /// Most significant index (inclusive).
        msb: u32,
        /// Least significant index (inclusive).
        lsb: u32,
    },
}

impl BitRange {
    /// Builds a range from signed indices where a negative value means "absent".
    ///
    /// A negative `msb` selects the whole value; a negative `lsb` selects the
    /// single bit at `msb`.
    pub fn from_indices(msb: i32, lsb: i32) -> Self {
        if msb < 0 {
            BitRange::All
        } else if lsb < 0 {
            BitRange::Bit(msb as u32)
        } else {
            BitRange::Span {
                msb: msb as u32,
                lsb: lsb as u32,
            }
        }
    }

    /// Returns the number of bits addressed, or `None` for [`BitRange::All`].
    pub fn width(self) -> Option<u32> {
        match self {
            BitRange::All => None,
            BitRange::Bit(_) => Some(1),
            BitRange::Span { msb, lsb } => msb.checked_sub(lsb).map(|w| w + 1),
        }
    }

    /// Resolves the range against a value of `size` bits.
    ///
    /// Returns the inclusive `(msb, lsb)` pair, or `None` when the range does
    /// not fit or is reversed.
    pub fn resolve(self, size: u32) -> Option<(u32, u32)> {
        let (msb, lsb) = match self {
            BitRange::All => (size.checked_sub(1)?, 0),
            BitRange::Bit(i) => (i, i),
            BitRange::Span { msb, lsb } => (msb, lsb),
        };
        if lsb > msb || msb >= size {
            return None;
        }
        Some((msb, lsb))
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitRange::All => Ok(()),
            BitRange::Bit(i) => write!(f, "({i})"),
            BitRange::Span { msb, lsb } => write!(f, "({msb} downto {lsb})"),
        }
    }
}

impl BitValue {
    /// The null value: size 0, meaning "undefined".
    pub fn null() -> Self {
        Self {
            size: 0,
            data: Vec::new(),
        }
    }

    /// Creates a value of `size` bits, all cleared.
    pub fn zero(size: u32) -> Self {
        Self {
            size,
            data: vec![0; word_count(size)],
        }
    }

    /// Creates a value of `size` bits, all set.
    pub fn one(size: u32) -> Self {
        let mut v = Self {
            size,
            data: vec![u64::MAX; word_count(size)],
        };
        v.clear_padding();
        v
    }

    /// Creates a single-bit value.
    pub fn from_bool(value: bool) -> Self {
        let mut v = Self::zero(1);
        v.set_bit(0, value);
        v
    }

    /// Creates a value of `size` bits from the low bits of `value`.
    pub fn from_u64(value: u64, size: u32) -> Self {
        let mut v = Self::zero(size);
        if let Some(word) = v.data.first_mut() {
            *word = value;
        }
        v.clear_padding();
        v
    }

    /// Parses MSB-first binary digits.
    ///
    /// Any character other than `0` or `1` yields the null value; no partial
    /// result is produced.
    pub fn from_binary_str(s: &str) -> Self {
        let mut v = Self::zero(s.chars().count() as u32);
        for (i, c) in s.chars().rev().enumerate() {
            match c {
                '0' => {}
                '1' => {
                    v.set_bit(i as u32, true);
                }
                _ => return Self::null(),
            }
        }
        v
    }

    /// Returns the number of bits.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns `true` for the null value.
    pub fn is_null(&self) -> bool {
        self.size == 0
    }

    /// Converts to a `u64`, or `None` if null or wider than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.is_null() || self.size > BITS_PER_WORD {
            return None;
        }
        Some(self.data[0])
    }

    /// Returns the bit at `index`; out-of-range indices read as `false`.
    pub fn bit(&self, index: u32) -> bool {
        if index >= self.size {
            return false;
        }
        let (word, offset) = locate(index);
        (self.data[word] >> offset) & 1 != 0
    }

    /// Sets the bit at `index`. Returns `false` if the index is out of range.
    pub fn set_bit(&mut self, index: u32, value: bool) -> bool {
        if index >= self.size {
            return false;
        }
        let (word, offset) = locate(index);
        if value {
            self.data[word] |= 1 << offset;
        } else {
            self.data[word] &= !(1 << offset);
        }
        true
    }

    /// Returns `true` if the value is non-null and every bit is clear.
    pub fn is_all_zero(&self) -> bool {
        !self.is_null() && self.data.iter().all(|w| *w == 0)
    }

    /// Returns `true` if the value is non-null and every bit is set.
    pub fn is_all_one(&self) -> bool {
        !self.is_null() && *self == Self::one(self.size)
    }

    /// Changes the size in place.
    ///
    /// `new_size == 0` and an unchanged size are no-ops. Growing appends
    /// cleared bits on the MSB side; shrinking drops the high bits.
    pub fn resize(&mut self, new_size: u32) {
        if new_size == 0 || new_size == self.size {
            return;
        }
        self.data.resize(word_count(new_size), 0);
        self.size = new_size;
        self.clear_padding();
    }

    /// Adds one, rippling from the LSB. Returns the carry out.
    ///
    /// All-ones wraps to all-zero with carry `true`. The null value is left
    /// untouched and reports no carry.
    pub fn increment(&mut self) -> bool {
        for i in 0..self.size {
            if self.bit(i) {
                self.set_bit(i, false);
            } else {
                self.set_bit(i, true);
                return false;
            }
        }
        !self.is_null()
    }

    /// Subtracts one, rippling from the LSB. Returns the borrow out.
    ///
    /// All-zero wraps to all-ones with borrow `true`.
    pub fn decrement(&mut self) -> bool {
        for i in 0..self.size {
            if self.bit(i) {
                self.set_bit(i, false);
                return false;
            } else {
                self.set_bit(i, true);
            }
        }
        !self.is_null()
    }

    /// Extracts the addressed bits as a new value, or null if the range
    /// does not fit.
    pub fn subrange(&self, range: BitRange) -> BitValue {
        let Some((msb, lsb)) = range.resolve(self.size) else {
            return Self::null();
        };
        let mut out = Self::zero(msb - lsb + 1);
        for i in lsb..=msb {
            out.set_bit(i - lsb, self.bit(i));
        }
        out
    }

    /// Overwrites the addressed bits with `value`.
    ///
    /// The size of `value` must match the range exactly. Nothing is written
    /// on failure.
    pub fn set_subrange(&mut self, value: &BitValue, range: BitRange) -> bool {
        let Some((msb, lsb)) = range.resolve(self.size) else {
            return false;
        };
        if value.size != msb - lsb + 1 {
            return false;
        }
        for i in lsb..=msb {
            self.set_bit(i, value.bit(i - lsb));
        }
        true
    }

    /// Joins values MSB-first: the first part ends up in the highest bits.
    ///
    /// Returns null if `parts` is empty or any part is null.
    pub fn concat(parts: &[BitValue]) -> BitValue {
        if parts.is_empty() || parts.iter().any(BitValue::is_null) {
            return Self::null();
        }
        let total: u32 = parts.iter().map(BitValue::size).sum();
        let mut out = Self::zero(total);
        let mut offset = total;
        for part in parts {
            offset -= part.size;
            for i in 0..part.size {
                out.set_bit(offset + i, part.bit(i));
            }
        }
        out
    }

    fn clear_padding(&mut self) {
        let rem = self.size % BITS_PER_WORD;
        if rem != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    fn zip_words(&self, rhs: &BitValue, op: impl Fn(u64, u64) -> u64) -> BitValue {
        if self.size != rhs.size {
            return Self::null();
        }
        let mut out = Self {
            size: self.size,
            data: self
                .data
                .iter()
                .zip(&rhs.data)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        };
        out.clear_padding();
        out
    }
}

impl fmt::Display for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.size).rev() {
            write!(f, "{}", if self.bit(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "BitValue(null)")
        } else {
            write!(f, "BitValue({self})")
        }
    }
}

impl BitAnd for &BitValue {
    type Output = BitValue;

    fn bitand(self, rhs: Self) -> BitValue {
        self.zip_words(rhs, |a, b| a & b)
    }
}

impl BitOr for &BitValue {
    type Output = BitValue;

    fn bitor(self, rhs: Self) -> BitValue {
        self.zip_words(rhs, |a, b| a | b)
    }
}

impl BitXor for &BitValue {
    type Output = BitValue;

    fn bitxor(self, rhs: Self) -> BitValue {
        self.zip_words(rhs, |a, b| a ^ b)
    }
}

impl Not for &BitValue {
    type Output = BitValue;

    fn not(self) -> BitValue {
        let mut out = BitValue {
            size: self.size,
            data: self.data.iter().map(|w| !w).collect(),
        };
        out.clear_padding();
        out
    }
}

/// Returns the number of u64 words needed to store `size` bits.
fn word_count(size: u32) -> usize {
    size.div_ceil(BITS_PER_WORD) as usize
}

fn locate(index: u32) -> (usize, u32) {
    ((index / BITS_PER_WORD) as usize, index % BITS_PER_WORD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bv(s: &str) -> BitValue {
        BitValue::from_binary_str(s)
    }

    #[test]
    fn zero_and_one_sizes() {
        assert_eq!(BitValue::zero(5).size(), 5);
        assert_eq!(BitValue::one(5).size(), 5);
        assert_eq!(format!("{}", BitValue::one(5)), "11111");
        assert_eq!(format!("{}", BitValue::zero(3)), "000");
    }

    #[test]
    fn null_is_distinct_from_zero() {
        assert!(BitValue::null().is_null());
        assert_ne!(BitValue::null(), BitValue::zero(1));
        assert!(!BitValue::null().is_all_zero());
    }

    #[test]
    fn from_string_msb_first() {
        let v = bv("1000");
        assert_eq!(v.size(), 4);
        assert!(v.bit(3));
        assert!(!v.bit(0));
        assert_eq!(v.to_u64(), Some(8));
    }

    #[test]
    fn from_string_rejects_other_chars() {
        assert!(bv("10x1").is_null());
        assert!(bv("2").is_null());
        assert!(bv("").is_null());
    }

    #[test]
    fn resize_grows_with_false_and_truncates() {
        let mut v = bv("11");
        v.resize(4);
        assert_eq!(format!("{v}"), "0011");
        v.resize(1);
        assert_eq!(format!("{v}"), "1");
        v.resize(0);
        assert_eq!(v.size(), 1);
    }

    #[test]
    fn mismatched_binary_ops_yield_null() {
        let a = bv("101");
        let b = bv("10");
        assert!((&a & &b).is_null());
        assert!((&a | &b).is_null());
        assert!((&a ^ &b).is_null());
    }

    #[test]
    fn bitwise_ops() {
        let a = bv("1100");
        let b = bv("1010");
        assert_eq!(format!("{}", &a & &b), "1000");
        assert_eq!(format!("{}", &a | &b), "1110");
        assert_eq!(format!("{}", &a ^ &b), "0110");
        assert_eq!(format!("{}", !&a), "0011");
    }

    #[test]
    fn increment_wraps_with_carry() {
        let mut v = BitValue::one(3);
        assert!(v.increment());
        assert_eq!(v, BitValue::zero(3));
        assert!(v.decrement());
        assert_eq!(v, BitValue::one(3));
    }

    #[test]
    fn increment_without_carry() {
        let mut v = bv("011");
        assert!(!v.increment());
        assert_eq!(format!("{v}"), "100");
    }

    #[test]
    fn subrange_addressing() {
        let v = bv("110010");
        assert_eq!(v.subrange(BitRange::All), v);
        assert_eq!(v.subrange(BitRange::Bit(1)), bv("1"));
        assert_eq!(v.subrange(BitRange::Span { msb: 5, lsb: 3 }), bv("110"));
        assert!(v.subrange(BitRange::Span { msb: 2, lsb: 3 }).is_null());
        assert!(v.subrange(BitRange::Bit(6)).is_null());
        assert!(v.subrange(BitRange::Span { msb: 6, lsb: 0 }).is_null());
    }

    #[test]
    fn range_from_signed_indices() {
        assert_eq!(BitRange::from_indices(-1, 3), BitRange::All);
        assert_eq!(BitRange::from_indices(2, -1), BitRange::Bit(2));
        assert_eq!(
            BitRange::from_indices(3, 1),
            BitRange::Span { msb: 3, lsb: 1 }
        );
    }

    #[test]
    fn set_subrange_is_all_or_nothing() {
        let mut v = BitValue::zero(4);
        assert!(v.set_subrange(&bv("11"), BitRange::Span { msb: 2, lsb: 1 }));
        assert_eq!(format!("{v}"), "0110");
        assert!(!v.set_subrange(&bv("111"), BitRange::Span { msb: 2, lsb: 1 }));
        assert!(!v.set_subrange(&bv("1"), BitRange::Bit(4)));
        assert_eq!(format!("{v}"), "0110");
    }

    #[test]
    fn concat_is_msb_first() {
        let v = BitValue::concat(&[bv("10"), bv("011")]);
        assert_eq!(format!("{v}"), "10011");
        assert!(BitValue::concat(&[bv("1"), BitValue::null()]).is_null());
        assert!(BitValue::concat(&[]).is_null());
    }

    #[test]
    fn wide_values_span_words() {
        let mut v = BitValue::zero(100);
        v.set_bit(99, true);
        v.set_bit(64, true);
        assert!(v.bit(99));
        assert!(v.bit(64));
        assert!(!v.bit(63));
        assert_eq!(v.to_u64(), None);
        let one = BitValue::one(100);
        assert!(one.is_all_one());
        assert_eq!((&one ^ &one), BitValue::zero(100));
    }

    #[test]
    fn serde_roundtrip() {
        let v = bv("10110");
        let json = serde_json::to_string(&v).unwrap();
        let back: BitValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn malformed_storage_deserializes_to_null() {
        let short: BitValue = serde_json::from_str(r#"{"size":5,"data":[]}"#).unwrap();
        assert!(short.is_null());
        assert_eq!(short.to_string(), "");
        assert_eq!(short.to_u64(), None);

        let long: BitValue = serde_json::from_str(r#"{"size":3,"data":[1,2]}"#).unwrap();
        assert!(long.is_null());
    }

    #[test]
    fn stored_padding_bits_are_masked() {
        let padded: BitValue = serde_json::from_str(r#"{"size":4,"data":[255]}"#).unwrap();
        assert_eq!(padded, bv("1111"));
        assert_eq!(padded.to_u64(), Some(15));
    }

    proptest! {
        #[test]
        fn xor_with_self_is_zero(raw in any::<u64>(), size in 1u32..=64) {
            let a = BitValue::from_u64(raw, size);
            prop_assert_eq!(&a ^ &a, BitValue::zero(size));
        }

        #[test]
        fn subrange_of_whole_is_identity(raw in any::<u64>(), size in 1u32..=64) {
            let a = BitValue::from_u64(raw, size);
            prop_assert_eq!(a.subrange(BitRange::Span { msb: size - 1, lsb: 0 }), a);
        }

        #[test]
        fn increment_then_decrement_restores(raw in any::<u64>(), size in 1u32..=16, n in 0usize..40) {
            let original = BitValue::from_u64(raw, size);
            let mut v = original.clone();
            let carries: Vec<bool> = (0..n).map(|_| v.increment()).collect();
            let borrows: Vec<bool> = (0..n).map(|_| v.decrement()).collect();
            prop_assert_eq!(&v, &original);
            prop_assert_eq!(
                carries.iter().filter(|c| **c).count(),
                borrows.iter().filter(|b| **b).count()
            );
        }

        #[test]
        fn string_roundtrip(raw in any::<u64>(), size in 1u32..=64) {
            let v = BitValue::from_u64(raw, size);
            prop_assert_eq!(BitValue::from_binary_str(&v.to_string()), v);
        }
    }
}
