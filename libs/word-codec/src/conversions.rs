//! Word sequence conversions
//!
//! Low-level helpers shared by the codec. Numeric helpers work on the raw
//! two's-complement / IEEE-754 bit pattern; callers handle signedness.

use crate::WordOrder;

/// Split the low `count * 16` bits of `bits` into words, honoring `order`
///
/// # Example
/// ```
/// use word_codec::conversions::bits_to_words;
/// use word_codec::WordOrder;
///
/// assert_eq!(bits_to_words(0x1234_5678, 2, WordOrder::Big), vec![0x1234, 0x5678]);
/// assert_eq!(bits_to_words(0x1234_5678, 2, WordOrder::Little), vec![0x5678, 0x1234]);
/// ```
pub fn bits_to_words(bits: u64, count: usize, order: WordOrder) -> Vec<u16> {
    let mut words: Vec<u16> = (0..count)
        .rev()
        .map(|i| (bits >> (16 * i)) as u16)
        .collect();
    order.arrange_words(&mut words);
    words
}

/// Reassemble words produced by [`bits_to_words`]
pub fn words_to_bits(words: &[u16], order: WordOrder) -> u64 {
    let mut msw_first = words.to_vec();
    // Reversal is its own inverse
    order.arrange_words(&mut msw_first);
    msw_first
        .iter()
        .fold(0u64, |acc, &w| (acc << 16) | u64::from(w))
}

/// Pack a string into exactly `word_count` words
///
/// Two bytes per word, first byte in the high half for `Big`. Input longer
/// than the window is cut at the last whole character that fits; unused words
/// are zero.
pub fn pack_string(text: &str, word_count: usize, order: WordOrder) -> Vec<u16> {
    let capacity = word_count * 2;
    let mut end = text.len().min(capacity);
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    let mut bytes = text.as_bytes()[..end].to_vec();
    bytes.resize(capacity, 0);

    bytes
        .chunks_exact(2)
        .map(|pair| order.arrange_bytes(u16::from_be_bytes([pair[0], pair[1]])))
        .collect()
}

/// Unpack words produced by [`pack_string`], dropping trailing NUL padding
pub fn unpack_string(words: &[u16], order: WordOrder) -> String {
    let mut bytes: Vec<u8> = words
        .iter()
        .flat_map(|&w| order.arrange_bytes(w).to_be_bytes())
        .collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_word_orders() {
        let bits = 0x0102_0304_0506_0708;
        assert_eq!(
            bits_to_words(bits, 4, WordOrder::Big),
            vec![0x0102, 0x0304, 0x0506, 0x0708]
        );
        assert_eq!(
            bits_to_words(bits, 4, WordOrder::Little),
            vec![0x0708, 0x0506, 0x0304, 0x0102]
        );
        assert_eq!(
            words_to_bits(&[0x0708, 0x0506, 0x0304, 0x0102], WordOrder::Little),
            bits
        );
    }

    #[test]
    fn test_pack_string_padding() {
        assert_eq!(
            pack_string("ABC", 3, WordOrder::Big),
            vec![0x4142, 0x4300, 0x0000]
        );
        assert_eq!(pack_string("ABC", 2, WordOrder::Little), vec![0x4241, 0x0043]);
    }

    #[test]
    fn test_pack_string_truncates_on_char_boundary() {
        // "é" is two bytes; only "a" plus one byte would fit
        let words = pack_string("aé", 1, WordOrder::Big);
        assert_eq!(words, vec![0x6100]);
        assert_eq!(unpack_string(&words, WordOrder::Big), "a");
    }

    #[test]
    fn test_unpack_string_trims_padding() {
        assert_eq!(unpack_string(&[0x4142, 0x0000], WordOrder::Big), "AB");
        assert_eq!(unpack_string(&[0x4241, 0x0043], WordOrder::Little), "ABC");
        assert_eq!(unpack_string(&[0, 0], WordOrder::Big), "");
    }
}
