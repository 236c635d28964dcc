//! Token counting for budget checks inside the chunker.

/// Counts tokens in a string. Implementations need not agree on what a
/// "token" is with any particular model — the chunker only needs a
/// consistent, monotonic notion of size.
pub trait Tokenizer: Send + Sync {
    /// Returns the token count for `text`.
    fn count_tokens(&self, text: &str) -> usize;
}

/// Approximate tokenizer used when the caller supplies none: a
/// characters-per-token heuristic in the same family as `cl100k_base`'s
/// average ratio. The chunker compensates for its imprecision by shrinking
/// the effective budget rather than by refining the estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenizer;

impl Tokenizer for ApproxTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_tokenizer_rounds_up() {
        let t = ApproxTokenizer;
        assert_eq!(t.count_tokens("abcd"), 1);
        assert_eq!(t.count_tokens("abcde"), 2);
        assert_eq!(t.count_tokens(""), 0);
    }

    #[test]
    fn closures_implement_tokenizer() {
        let t = |s: &str| s.len();
        assert_eq!(t.count_tokens("abc"), 3);
    }
}
