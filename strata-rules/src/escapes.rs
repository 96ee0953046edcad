//! Decodes the escape grammar used for literal header/footer patterns:
//! `\xNN` hex escapes and the C-like escapes `\n \r \t \v \a \\ \s`.

use crate::error::{Result, RulesError};

/// Decode a pattern's textual form into raw bytes. `\s` expands to a literal
/// space; the rest follow their usual C meaning.
pub fn decode_pattern(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let Some(&escape) = bytes.get(i + 1) else {
            return Err(RulesError::InvalidEscape(text.to_string()));
        };
        match escape {
            b'x' => {
                let hex = bytes
                    .get(i + 2..i + 4)
                    .ok_or_else(|| RulesError::InvalidEscape(text.to_string()))?;
                let hex_str =
                    std::str::from_utf8(hex).map_err(|_| RulesError::InvalidEscape(text.to_string()))?;
                let value = u8::from_str_radix(hex_str, 16)
                    .map_err(|_| RulesError::InvalidEscape(text.to_string()))?;
                out.push(value);
                i += 4;
            }
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'v' => {
                out.push(0x0b);
                i += 2;
            }
            b'a' => {
                out.push(0x07);
                i += 2;
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b's' => {
                out.push(b' ');
                i += 2;
            }
            _ => return Err(RulesError::InvalidEscape(text.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(decode_pattern("abc").unwrap(), b"abc");
    }

    #[test]
    fn hex_escape() {
        assert_eq!(decode_pattern("\\xff\\xd8").unwrap(), vec![0xff, 0xd8]);
    }

    #[test]
    fn c_escapes() {
        assert_eq!(decode_pattern("\\n\\r\\t\\v\\a\\\\\\s").unwrap(), vec![b'\n', b'\r', b'\t', 0x0b, 0x07, b'\\', b' ']);
    }

    #[test]
    fn mixed_literal_and_escapes() {
        assert_eq!(decode_pattern("PK\\x03\\x04").unwrap(), vec![b'P', b'K', 3, 4]);
    }

    #[test]
    fn truncated_hex_escape_is_rejected() {
        assert!(decode_pattern("\\xf").is_err());
    }

    #[test]
    fn unknown_escape_is_rejected() {
        assert!(decode_pattern("\\q").is_err());
    }
}
