//! Fixed-width key and value encodings plus the comparators the tree orders
//! keys with.

use std::cmp::Ordering;
use std::fmt;

use crate::types::{IndexError, Result};

/// Widest encoded key a tree page accepts.
pub const MAX_KEY_SIZE: usize = 64;

/// Key types storable in tree pages. Every key encodes to exactly
/// [`ENCODED_LEN`](Self::ENCODED_LEN) bytes.
pub trait KeyCodec: Sized + Clone + fmt::Debug {
    /// Encoded width in bytes.
    const ENCODED_LEN: usize;

    /// Encodes `key` into `out`, which is exactly `ENCODED_LEN` bytes.
    fn encode_key(key: &Self, out: &mut [u8]);

    /// Decodes a key from exactly `ENCODED_LEN` bytes.
    fn decode_key(bytes: &[u8]) -> Result<Self>;
}

/// Value types storable in leaf pages.
pub trait ValCodec: Sized + Clone + fmt::Debug {
    /// Encoded width in bytes.
    const ENCODED_LEN: usize;

    /// Encodes `value` into `out`, which is exactly `ENCODED_LEN` bytes.
    fn encode_val(value: &Self, out: &mut [u8]);

    /// Decodes a value from exactly `ENCODED_LEN` bytes.
    fn decode_val(src: &[u8]) -> Result<Self>;
}

/// Types the bulk helpers can build from an integer.
pub trait FromInteger {
    /// Builds `Self` from `value`.
    fn from_integer(value: i64) -> Self;
}

/// Total order over keys used by a tree.
pub trait KeyComparator<K>: Send + Sync {
    /// Compares `a` with `b`.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a comparison closure to [`KeyComparator`].
#[derive(Clone, Copy)]
pub struct FnComparator<F>(pub F);

impl<K, F> KeyComparator<K> for FnComparator<F>
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

fn check_len(bytes: &[u8], expected: usize, what: &'static str) -> Result<()> {
    if bytes.len() != expected {
        return Err(IndexError::Corruption(what));
    }
    Ok(())
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(arr)
}

impl KeyCodec for u64 {
    const ENCODED_LEN: usize = 8;

    fn encode_key(key: &Self, out: &mut [u8]) {
        out.copy_from_slice(&key.to_be_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, 8, "u64 key length mismatch")?;
        Ok(read_u64(bytes))
    }
}

impl ValCodec for u64 {
    const ENCODED_LEN: usize = 8;

    fn encode_val(value: &Self, out: &mut [u8]) {
        out.copy_from_slice(&value.to_be_bytes());
    }

    fn decode_val(src: &[u8]) -> Result<Self> {
        check_len(src, 8, "u64 value length mismatch")?;
        Ok(read_u64(src))
    }
}

impl FromInteger for u64 {
    fn from_integer(value: i64) -> Self {
        value as u64
    }
}

const SIGN_FLIP: u64 = 1 << 63;

impl KeyCodec for i64 {
    const ENCODED_LEN: usize = 8;

    fn encode_key(key: &Self, out: &mut [u8]) {
        out.copy_from_slice(&((*key as u64) ^ SIGN_FLIP).to_be_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, 8, "i64 key length mismatch")?;
        Ok((read_u64(bytes) ^ SIGN_FLIP) as i64)
    }
}

impl ValCodec for i64 {
    const ENCODED_LEN: usize = 8;

    fn encode_val(value: &Self, out: &mut [u8]) {
        out.copy_from_slice(&value.to_be_bytes());
    }

    fn decode_val(src: &[u8]) -> Result<Self> {
        check_len(src, 8, "i64 value length mismatch")?;
        Ok(read_u64(src) as i64)
    }
}

impl FromInteger for i64 {
    fn from_integer(value: i64) -> Self {
        value
    }
}

/// Fixed-width opaque key of `N` bytes, `4 <= N <= 64`.
///
/// Integer keys are stored big-endian with the sign bit flipped so byte order
/// matches numeric order. Widths below 8 keep only the low 32 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    const WIDTH_OK: () = assert!(N >= 4 && N <= MAX_KEY_SIZE, "GenericKey width out of range");

    /// All-zero key.
    pub fn zeroed() -> Self {
        let () = Self::WIDTH_OK;
        Self { data: [0; N] }
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(data: [u8; N]) -> Self {
        let () = Self::WIDTH_OK;
        Self { data }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// Overwrites the key with the order-preserving encoding of `value`.
    pub fn set_from_integer(&mut self, value: i64) {
        self.data = [0; N];
        if N >= 8 {
            self.data[..8].copy_from_slice(&((value as u64) ^ SIGN_FLIP).to_be_bytes());
        } else {
            let narrow = (value as i32 as u32) ^ (1 << 31);
            self.data[..4].copy_from_slice(&narrow.to_be_bytes());
        }
    }

    /// Integer previously stored with [`set_from_integer`](Self::set_from_integer).
    pub fn to_integer(&self) -> i64 {
        if N >= 8 {
            (read_u64(&self.data) ^ SIGN_FLIP) as i64
        } else {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(&self.data[..4]);
            (u32::from_be_bytes(arr) ^ (1 << 31)) as i32 as i64
        }
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{N}>({})", self.to_integer())
    }
}

impl<const N: usize> fmt::Display for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_integer())
    }
}

impl<const N: usize> KeyCodec for GenericKey<N> {
    const ENCODED_LEN: usize = N;

    fn encode_key(key: &Self, out: &mut [u8]) {
        out.copy_from_slice(&key.data);
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        let data: [u8; N] = bytes
            .try_into()
            .map_err(|_| IndexError::Corruption("generic key length mismatch"))?;
        Ok(Self::from_bytes(data))
    }
}

impl<const N: usize> FromInteger for GenericKey<N> {
    fn from_integer(value: i64) -> Self {
        let mut key = Self::zeroed();
        key.set_from_integer(value);
        key
    }
}

/// Orders [`GenericKey`]s by their raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericComparator<const N: usize>;

impl<const N: usize> KeyComparator<GenericKey<N>> for GenericComparator<N> {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.data.as_slice().cmp(b.data.as_slice())
    }
}

/// Location of a tuple: heap page and slot within it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    /// Heap page holding the record.
    pub page_id: u32,
    /// Slot within the page.
    pub slot: u32,
}

impl RecordId {
    /// Builds a record id.
    pub const fn new(page_id: u32, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

impl FromInteger for RecordId {
    /// High 32 bits become the page id, low 32 bits the slot.
    fn from_integer(value: i64) -> Self {
        let raw = value as u64;
        Self::new((raw >> 32) as u32, raw as u32)
    }
}

impl ValCodec for RecordId {
    const ENCODED_LEN: usize = 8;

    fn encode_val(value: &Self, out: &mut [u8]) {
        out[..4].copy_from_slice(&value.page_id.to_be_bytes());
        out[4..8].copy_from_slice(&value.slot.to_be_bytes());
    }

    fn decode_val(src: &[u8]) -> Result<Self> {
        check_len(src, 8, "record id length mismatch")?;
        let raw = read_u64(src);
        Ok(Self::new((raw >> 32) as u32, raw as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_encoding_sorts_like_integers() {
        let values = [i64::MIN, -5, -1, 0, 1, 42, i64::MAX];
        let encoded: Vec<[u8; 8]> = values
            .iter()
            .map(|v| {
                let mut out = [0u8; 8];
                i64::encode_key(v, &mut out);
                out
            })
            .collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for (v, bytes) in values.iter().zip(&encoded) {
            assert_eq!(i64::decode_key(bytes).unwrap(), *v);
        }
    }

    #[test]
    fn generic_key_byte_order_matches_integer_order() {
        let cmp = GenericComparator::<8>;
        let neg = GenericKey::<8>::from_integer(-3);
        let pos = GenericKey::<8>::from_integer(7);
        assert_eq!(cmp.compare(&neg, &pos), Ordering::Less);
        assert_eq!(pos.to_integer(), 7);
        assert_eq!(neg.to_integer(), -3);

        let narrow = GenericKey::<4>::from_integer(-9);
        assert_eq!(narrow.to_integer(), -9);
        let wide = GenericKey::<64>::from_integer(123);
        assert_eq!(wide.as_bytes()[8..], [0u8; 56]);
    }

    #[test]
    fn record_id_splits_integer_halves() {
        let rid = RecordId::from_integer((5i64 << 32) | 9);
        assert_eq!(rid, RecordId::new(5, 9));
        let mut out = [0u8; 8];
        RecordId::encode_val(&rid, &mut out);
        assert_eq!(RecordId::decode_val(&out).unwrap(), rid);
        assert_eq!(rid.to_string(), "5:9");
    }

    #[test]
    fn decoding_rejects_wrong_widths() {
        assert!(matches!(u64::decode_key(&[0u8; 3]), Err(IndexError::Corruption(_))));
        assert!(GenericKey::<16>::decode_key(&[0u8; 8]).is_err());
    }
}
