//! Text normalization and error-rate scoring
//!
//! Shared primitives for the cleanup ranker and the benchmark harness:
//! normalization, word/character Levenshtein distance, and WER/CER (edit
//! distance normalized by reference length).

use serde::{Deserialize, Serialize};

/// Controls which normalization steps run before scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    pub lowercase: bool,
    pub strip_punctuation: bool,
    pub keep_apostrophes: bool,
    pub collapse_whitespace: bool,
    pub trim_whitespace: bool,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            keep_apostrophes: true,
            collapse_whitespace: true,
            trim_whitespace: true,
        }
    }
}

/// Applies a [`NormalizationPolicy`] to text
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    policy: NormalizationPolicy,
    strip_punctuation: Option<regex::Regex>,
    collapse_whitespace: Option<regex::Regex>,
}

impl TextNormalizer {
    pub fn new(policy: NormalizationPolicy) -> Self {
        let strip_punctuation = policy.strip_punctuation.then(|| {
            let pattern = if policy.keep_apostrophes {
                r"[^\p{L}\p{N}\s']+"
            } else {
                r"[^\p{L}\p{N}\s]+"
            };
            regex::Regex::new(pattern).expect("static pattern")
        });
        let collapse_whitespace = policy
            .collapse_whitespace
            .then(|| regex::Regex::new(r"\s+").expect("static pattern"));

        Self {
            policy,
            strip_punctuation,
            collapse_whitespace,
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        let mut output = text.replace('\n', " ");

        if self.policy.lowercase {
            output = output.to_lowercase();
        }
        if let Some(re) = &self.strip_punctuation {
            output = re.replace_all(&output, " ").into_owned();
        }
        if let Some(re) = &self.collapse_whitespace {
            output = re.replace_all(&output, " ").into_owned();
        }
        if self.policy.trim_whitespace {
            output = output.trim().to_string();
        }

        output
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(NormalizationPolicy::default())
    }
}

/// WER/CER measurements for one reference/hypothesis pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextQualityMetrics {
    pub wer: f64,
    pub cer: f64,
    pub word_edits: usize,
    pub word_reference_count: usize,
    pub char_edits: usize,
    pub char_reference_count: usize,
}

/// Running totals for corpus-level WER/CER
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricTotals {
    pub word_edits: usize,
    pub word_reference_count: usize,
    pub char_edits: usize,
    pub char_reference_count: usize,
}

impl MetricTotals {
    pub fn add(&mut self, metrics: &TextQualityMetrics) {
        self.word_edits += metrics.word_edits;
        self.word_reference_count += metrics.word_reference_count;
        self.char_edits += metrics.char_edits;
        self.char_reference_count += metrics.char_reference_count;
    }

    pub fn wer(&self) -> Option<f64> {
        (self.word_reference_count > 0)
            .then(|| self.word_edits as f64 / self.word_reference_count as f64)
    }

    pub fn cer(&self) -> Option<f64> {
        (self.char_reference_count > 0)
            .then(|| self.char_edits as f64 / self.char_reference_count as f64)
    }
}

/// Scores a hypothesis against a reference after normalization
pub fn score(reference: &str, hypothesis: &str, normalizer: &TextNormalizer) -> TextQualityMetrics {
    let reference = normalizer.normalize(reference);
    let hypothesis = normalizer.normalize(hypothesis);

    let reference_words = tokenize_words(&reference);
    let hypothesis_words = tokenize_words(&hypothesis);
    let reference_chars = tokenize_characters(&reference);
    let hypothesis_chars = tokenize_characters(&hypothesis);

    let word_edits = levenshtein(&reference_words, &hypothesis_words);
    let char_edits = levenshtein(&reference_chars, &hypothesis_chars);

    let wer = if reference_words.is_empty() {
        if hypothesis_words.is_empty() {
            0.0
        } else {
            1.0
        }
    } else {
        word_edits as f64 / reference_words.len() as f64
    };
    let cer = if reference_chars.is_empty() {
        if hypothesis_chars.is_empty() {
            0.0
        } else {
            1.0
        }
    } else {
        char_edits as f64 / reference_chars.len() as f64
    };

    TextQualityMetrics {
        wer,
        cer,
        word_edits,
        word_reference_count: reference_words.len(),
        char_edits,
        char_reference_count: reference_chars.len(),
    }
}

pub fn tokenize_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

pub fn tokenize_characters(text: &str) -> Vec<char> {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Two-row Levenshtein over arbitrary equatable tokens
pub fn levenshtein<T: PartialEq>(lhs: &[T], rhs: &[T]) -> usize {
    if lhs == rhs {
        return 0;
    }
    if lhs.is_empty() {
        return rhs.len();
    }
    if rhs.is_empty() {
        return lhs.len();
    }

    let mut previous: Vec<usize> = (0..=rhs.len()).collect();
    let mut current = vec![0usize; rhs.len() + 1];

    for (i, left) in lhs.iter().enumerate() {
        current[0] = i + 1;
        for (j, right) in rhs.iter().enumerate() {
            let substitution_cost = usize::from(left != right);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = previous[j] + substitution_cost;
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[rhs.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_default_policy() {
        let normalizer = TextNormalizer::default();
        assert_eq!(
            normalizer.normalize("Hello,   World!\nIt's me."),
            "hello world it's me"
        );
    }

    #[test]
    fn test_normalizer_strips_apostrophes_when_configured() {
        let normalizer = TextNormalizer::new(NormalizationPolicy {
            keep_apostrophes: false,
            ..NormalizationPolicy::default()
        });
        assert_eq!(normalizer.normalize("it's"), "it s");
    }

    #[test]
    fn test_levenshtein_words() {
        let a = tokenize_words("the quick brown fox");
        let b = tokenize_words("the quick red fox jumps");
        assert_eq!(levenshtein(&a, &b), 2);
        assert_eq!(levenshtein(&a, &a), 0);
        assert_eq!(levenshtein(&a, &[]), 4);
    }

    #[test]
    fn test_score_identical_is_zero() {
        let metrics = score("Exact match.", "exact match", &TextNormalizer::default());
        assert_eq!(metrics.wer, 0.0);
        assert_eq!(metrics.cer, 0.0);
    }

    #[test]
    fn test_score_one_substitution() {
        let metrics = score(
            "the cat sat on the mat",
            "the cat sat on the hat",
            &TextNormalizer::default(),
        );
        assert_eq!(metrics.word_edits, 1);
        assert!((metrics.wer - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_empty_reference() {
        let normalizer = TextNormalizer::default();
        assert_eq!(score("", "", &normalizer).wer, 0.0);
        assert_eq!(score("", "something", &normalizer).wer, 1.0);
    }

    #[test]
    fn test_metric_totals_pooling() {
        let normalizer = TextNormalizer::default();
        let mut totals = MetricTotals::default();
        totals.add(&score("a b c d", "a b c d", &normalizer));
        totals.add(&score("a b", "a x", &normalizer));
        assert_eq!(totals.wer(), Some(1.0 / 6.0));
        assert!(totals.cer().is_some());
    }

    #[test]
    fn test_metric_totals_empty_is_none() {
        let totals = MetricTotals::default();
        assert_eq!(totals.wer(), None);
        assert_eq!(totals.cer(), None);
    }
}
