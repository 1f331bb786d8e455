//! Token estimation: a cheap word-count heuristic, or an external BPE codec.

use supervisor_common::TokenEstimatorMode;

/// `ceil(word_count * 1.3)`. Empty input is 0 tokens.
fn simple_estimate(text: &str) -> u64 {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return 0;
    }
    ((word_count as f64) * 1.3).ceil() as u64
}

/// BPE token count via `tiktoken-rs`'s `cl100k_base` encoding. Falls back to
/// the simple heuristic if the codec can't be constructed.
fn tiktoken_estimate(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    match tiktoken_rs::cl100k_base() {
        Ok(bpe) => bpe.encode_with_special_tokens(text).len() as u64,
        Err(_) => simple_estimate(text),
    }
}

/// Estimates the token count of `text` under the configured mode. An
/// unrecognized mode string (handled upstream by
/// `TokenEstimatorMode::parse`) already coerces to `Simple`.
pub fn estimate_tokens(text: &str, mode: TokenEstimatorMode) -> u64 {
    match mode {
        TokenEstimatorMode::Simple => simple_estimate(text),
        TokenEstimatorMode::Tiktoken => tiktoken_estimate(text),
    }
}

/// Byte-based estimate used for files we don't want to fully decode as
/// UTF-8 text (roughly 4 bytes per token, a common approximation for
/// natural-language and source text alike).
pub fn estimate_tokens_from_bytes(byte_len: u64) -> u64 {
    if byte_len == 0 {
        return 0;
    }
    ((byte_len as f64) / 4.0).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero_tokens() {
        assert_eq!(estimate_tokens("", TokenEstimatorMode::Simple), 0);
        assert_eq!(estimate_tokens("", TokenEstimatorMode::Tiktoken), 0);
    }

    #[test]
    fn simple_mode_applies_word_heuristic() {
        // 10 words * 1.3 = 13
        let text = "one two three four five six seven eight nine ten";
        assert_eq!(estimate_tokens(text, TokenEstimatorMode::Simple), 13);
    }

    #[test]
    fn byte_estimate_of_zero_is_zero() {
        assert_eq!(estimate_tokens_from_bytes(0), 0);
    }
}
