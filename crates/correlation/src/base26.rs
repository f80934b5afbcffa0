//! Base-26 encoding over the alphabet `A`..`Z`.
//!
//! `A` is the zero digit, so fixed-width values are left-padded with `A`.

const ALPHABET: [u8; 26] = *b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode `value` in base 26.
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return "A".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(ALPHABET[(value % 26) as usize]);
        value /= 26;
    }
    out.reverse();

    // Safety of from_utf8: ALPHABET is ASCII.
    String::from_utf8(out).unwrap_or_default()
}

/// Encode `value` in base 26, left-padded (or left-truncated) to `width`.
pub fn encode_fixed(value: u64, width: usize) -> String {
    let raw = encode(value);
    if raw.len() >= width {
        raw[raw.len() - width..].to_string()
    } else {
        let mut out = String::with_capacity(width);
        for _ in 0..width - raw.len() {
            out.push('A');
        }
        out.push_str(&raw);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_encodes_as_the_zero_digit() {
        assert_eq!(encode(0), "A");
        assert_eq!(encode_fixed(0, 5), "AAAAA");
    }

    #[test]
    fn small_values_round_the_alphabet() {
        assert_eq!(encode(1), "B");
        assert_eq!(encode(25), "Z");
        assert_eq!(encode(26), "BA");
    }

    #[test]
    fn fixed_width_pads_and_truncates() {
        assert_eq!(encode_fixed(1, 5), "AAAAB");
        assert_eq!(encode_fixed(29, 5).len(), 5);
        // 26^6 needs 7 digits; fixed(5) keeps the low-order 5.
        let wide = encode(26u64.pow(6));
        assert_eq!(encode_fixed(26u64.pow(6), 5), wide[wide.len() - 5..]);
    }

    proptest! {
        #[test]
        fn fixed_width_is_always_exact_and_alphabetic(value in any::<u64>(), width in 1usize..12) {
            let s = encode_fixed(value, width);
            prop_assert_eq!(s.len(), width);
            prop_assert!(s.bytes().all(|b| b.is_ascii_uppercase()));
        }

        #[test]
        fn encoding_is_injective_below_width_capacity(a in 0u64..11_881_376, b in 0u64..11_881_376) {
            // 11_881_376 == 26^5
            if a != b {
                prop_assert_ne!(encode_fixed(a, 5), encode_fixed(b, 5));
            }
        }
    }
}
