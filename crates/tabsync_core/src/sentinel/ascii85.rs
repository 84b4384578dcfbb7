//! Ascii85 (`!`..`u`) binary-to-text alphabet.
//!
//! Every 4-byte big-endian group becomes 5 digits in base 85, offset by `!`.
//! An all-zero full group is shortened to `z`. A final partial group of
//! `n` bytes is zero-padded and written as its first `n + 1` digits.

const OFFSET: u8 = b'!';
const ZERO_GROUP: u8 = b'z';
const MAX_DIGIT: u8 = 84;

/// Encode bytes as Ascii85 without delimiters or line breaks.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(4) * 5);

    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);

        if chunk.len() == 4 && value == 0 {
            out.push(ZERO_GROUP as char);
            continue;
        }

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (value % 85) as u8 + OFFSET;
            value /= 85;
        }
        out.extend(digits[..=chunk.len()].iter().map(|&d| d as char));
    }

    out
}

/// Decode Ascii85 text. ASCII whitespace is skipped.
///
/// # Errors
///
/// Returns a description of the problem for characters outside the
/// alphabet, a `z` inside a group, a group that overflows 32 bits, or a
/// final group of a single digit.
pub fn decode(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut len = 0usize;

    for (pos, byte) in text.bytes().enumerate() {
        match byte {
            b if b.is_ascii_whitespace() => {}
            ZERO_GROUP if len == 0 => out.extend_from_slice(&[0; 4]),
            ZERO_GROUP => return Err(format!("'z' inside a group at offset {pos}")),
            b'!'..=b'u' => {
                group[len] = byte - OFFSET;
                len += 1;
                if len == 5 {
                    out.extend_from_slice(&group_to_word(&group, pos)?);
                    len = 0;
                }
            }
            _ => {
                return Err(format!(
                    "invalid character {:?} at offset {pos}",
                    char::from(byte)
                ))
            }
        }
    }

    match len {
        0 => {}
        1 => return Err("final group has a single digit".to_string()),
        n => {
            for digit in &mut group[n..] {
                *digit = MAX_DIGIT;
            }
            let word = group_to_word(&group, text.len())?;
            out.extend_from_slice(&word[..n - 1]);
        }
    }

    Ok(out)
}

fn group_to_word(group: &[u8; 5], pos: usize) -> Result<[u8; 4], String> {
    group
        .iter()
        .try_fold(0u32, |acc, &d| acc.checked_mul(85)?.checked_add(u32::from(d)))
        .map(u32::to_be_bytes)
        .ok_or_else(|| format!("group ending at offset {pos} overflows 32 bits"))
}
