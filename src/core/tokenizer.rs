//! Token counting module - size accounting for token-mode chunking
//!
//! The default model is a whitespace word counter: a maximal run of
//! non-whitespace bytes is one token, and space, tab, CR and LF separate
//! tokens. BPE encodings from tiktoken and a fast heuristic are available
//! for budgets that must track a real LLM tokenizer.
//!
//! Usage:
//! ```ignore
//! use ctxchunk::core::tokenizer::{count_tokens, TokenModel};
//!
//! let words = count_tokens(b"hello  world\n", TokenModel::Whitespace);
//! assert_eq!(words, 2);
//! ```

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

/// Supported token models/encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenModel {
    /// Whitespace-delimited word count
    #[default]
    Whitespace,
    /// cl100k_base encoding (GPT-4, GPT-3.5-turbo, Claude 3 approximation)
    Cl100k,
    /// o200k_base encoding (GPT-4o native)
    O200k,
    /// Fast heuristic estimation (no BPE encoding)
    Heuristic,
}

impl TokenModel {
    fn get_bpe(&self) -> Option<&'static CoreBPE> {
        match self {
            TokenModel::Cl100k => CL100K_BPE.as_ref().ok(),
            TokenModel::O200k => O200K_BPE.as_ref().ok(),
            TokenModel::Whitespace | TokenModel::Heuristic => None,
        }
    }

    /// List all available models
    pub fn available_models() -> &'static [&'static str] {
        &["whitespace", "cl100k", "o200k", "heuristic"]
    }
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenModel::Whitespace => "whitespace",
            TokenModel::Cl100k => "cl100k",
            TokenModel::O200k => "o200k",
            TokenModel::Heuristic => "heuristic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TokenModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whitespace" | "words" | "default" => Ok(TokenModel::Whitespace),
            "cl100k" | "cl100k_base" | "gpt4" | "gpt-4" | "claude" => Ok(TokenModel::Cl100k),
            "o200k" | "o200k_base" | "gpt4o" | "gpt-4o" => Ok(TokenModel::O200k),
            "heuristic" | "fast" | "estimate" => Ok(TokenModel::Heuristic),
            _ => Err(format!(
                "Unknown model: {}. Available: {}",
                s,
                TokenModel::available_models().join(", ")
            )),
        }
    }
}

// Lazy-initialized BPE encodings (loaded once on first use)
static CL100K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| cl100k_base().map_err(|e| format!("Failed to load cl100k_base: {}", e)));

static O200K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| o200k_base().map_err(|e| format!("Failed to load o200k_base: {}", e)));

#[inline]
fn is_token_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Count whitespace-delimited tokens in raw bytes
pub fn count_whitespace_tokens(bytes: &[u8]) -> usize {
    let mut count = 0;
    let mut in_space = true;
    for &b in bytes {
        if is_token_separator(b) {
            in_space = true;
        } else {
            if in_space {
                count += 1;
            }
            in_space = false;
        }
    }
    count
}

/// Count tokens in content using the specified model
///
/// Non-UTF-8 content is decoded lossily for the BPE and heuristic models.
/// If a BPE encoding fails to load, the heuristic is used instead.
pub fn count_tokens(bytes: &[u8], model: TokenModel) -> usize {
    if bytes.is_empty() {
        return 0;
    }

    match model {
        TokenModel::Whitespace => count_whitespace_tokens(bytes),
        TokenModel::Heuristic => estimate_tokens_heuristic(&String::from_utf8_lossy(bytes)),
        TokenModel::Cl100k | TokenModel::O200k => {
            let text = String::from_utf8_lossy(bytes);
            match model.get_bpe() {
                Some(bpe) => bpe.encode_ordinary(&text).len(),
                None => estimate_tokens_heuristic(&text),
            }
        }
    }
}

/// Longest prefix of `bytes` (as a byte length) holding at most `budget` tokens
///
/// The whitespace model cuts right before the first token that would exceed
/// the budget, so trailing separators stay with the prefix. The other models
/// binary-search for the longest prefix that ends on a UTF-8 boundary.
pub fn prefix_within_tokens(bytes: &[u8], budget: usize, model: TokenModel) -> usize {
    match model {
        TokenModel::Whitespace => whitespace_prefix(bytes, budget),
        _ => {
            if count_tokens(bytes, model) <= budget {
                return bytes.len();
            }
            let (mut lo, mut hi) = (0usize, bytes.len());
            while lo < hi {
                let mid = floor_char_boundary(bytes, lo + (hi - lo).div_ceil(2));
                if mid <= lo {
                    break;
                }
                if count_tokens(&bytes[..mid], model) <= budget {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            lo
        }
    }
}

fn whitespace_prefix(bytes: &[u8], budget: usize) -> usize {
    let mut count = 0;
    let mut in_space = true;
    for (i, &b) in bytes.iter().enumerate() {
        if is_token_separator(b) {
            in_space = true;
        } else {
            if in_space {
                if count == budget {
                    return i;
                }
                count += 1;
            }
            in_space = false;
        }
    }
    bytes.len()
}

/// Move `index` back until it does not split a UTF-8 sequence
///
/// Only continuation bytes are skipped, so arbitrary binary-ish content still
/// gets a usable cut point. Never returns 0 for a non-zero `index` unless the
/// whole prefix is continuation bytes.
pub fn floor_char_boundary(bytes: &[u8], index: usize) -> usize {
    if index >= bytes.len() {
        return bytes.len();
    }
    let mut pos = index;
    while pos > 0 && (bytes[pos] & 0b1100_0000) == 0b1000_0000 {
        pos -= 1;
    }
    pos
}

/// Estimate tokens using a fast heuristic (no BPE encoding)
///
/// The heuristic accounts for:
/// - ASCII text: ~4 characters per token
/// - Code symbols: ~2 characters per token
/// - CJK characters: ~1.5 characters per token
/// - Other Unicode: ~2 characters per token
pub fn estimate_tokens_heuristic(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut ascii_chars = 0usize;
    let mut cjk_chars = 0usize;
    let mut other_unicode = 0usize;
    let mut whitespace = 0usize;
    let mut code_symbols = 0usize;

    for c in text.chars() {
        if c.is_ascii_whitespace() {
            whitespace += 1;
        } else if c.is_ascii() {
            if c.is_ascii_punctuation() {
                code_symbols += 1;
            } else {
                ascii_chars += 1;
            }
        } else if is_cjk_char(c) {
            cjk_chars += 1;
        } else {
            other_unicode += 1;
        }
    }

    let ascii_tokens = (ascii_chars + whitespace).div_ceil(4);
    let symbol_tokens = code_symbols.div_ceil(2);
    let cjk_tokens = (cjk_chars * 2).div_ceil(3);
    let other_tokens = other_unicode.div_ceil(2);

    ascii_tokens + symbol_tokens + cjk_tokens + other_tokens
}

#[inline]
fn is_cjk_char(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0x3000..=0x303F).contains(&cp)
        || (0x3040..=0x309F).contains(&cp)
        || (0x30A0..=0x30FF).contains(&cp)
        || (0xAC00..=0xD7AF).contains(&cp)
        || (0xFF00..=0xFFEF).contains(&cp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_count_basic() {
        assert_eq!(count_tokens(b"", TokenModel::Whitespace), 0);
        assert_eq!(count_tokens(b"   \t\r\n", TokenModel::Whitespace), 0);
        assert_eq!(count_tokens(b"one", TokenModel::Whitespace), 1);
        assert_eq!(count_tokens(b"  one  two\n\nthree ", TokenModel::Whitespace), 3);
    }

    #[test]
    fn test_whitespace_count_ignores_other_whitespace() {
        // Only space, tab, CR and LF separate tokens
        assert_eq!(count_whitespace_tokens(b"a\x0bb"), 1);
    }

    #[test]
    fn test_whitespace_prefix_keeps_trailing_separators() {
        let text = b"alpha beta  gamma delta";
        let cut = prefix_within_tokens(text, 2, TokenModel::Whitespace);
        assert_eq!(&text[..cut], b"alpha beta  ");
        assert_eq!(count_whitespace_tokens(&text[..cut]), 2);
    }

    #[test]
    fn test_whitespace_prefix_whole_input_when_under_budget() {
        let text = b"a b c";
        assert_eq!(prefix_within_tokens(text, 10, TokenModel::Whitespace), text.len());
    }

    #[test]
    fn test_whitespace_prefix_zero_budget() {
        assert_eq!(prefix_within_tokens(b"  word", 0, TokenModel::Whitespace), 2);
    }

    #[test]
    fn test_heuristic_prefix_fits_budget() {
        let text = "hello world ".repeat(50);
        let cut = prefix_within_tokens(text.as_bytes(), 10, TokenModel::Heuristic);
        assert!(cut > 0 && cut < text.len());
        assert!(count_tokens(&text.as_bytes()[..cut], TokenModel::Heuristic) <= 10);
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "你好".as_bytes();
        assert_eq!(floor_char_boundary(s, 4), 3);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }

    #[test]
    fn test_bpe_count_nonzero() {
        let tokens = count_tokens(b"fn main() { let x = 1 + 2; }", TokenModel::Cl100k);
        assert!(tokens > 0);
    }

    #[test]
    fn test_model_parse_and_display() {
        assert_eq!("whitespace".parse::<TokenModel>().unwrap(), TokenModel::Whitespace);
        assert_eq!("gpt-4o".parse::<TokenModel>().unwrap(), TokenModel::O200k);
        assert!("nope".parse::<TokenModel>().is_err());
        assert_eq!(TokenModel::Cl100k.to_string(), "cl100k");
        assert_eq!(TokenModel::default(), TokenModel::Whitespace);
    }
}
