//! Cleanup applied to extracted page text before it is narrated.
//!
//! Page text coming out of document backends carries layout artifacts that
//! sound wrong when spoken: words hyphenated across line breaks, citation
//! markers, runs of whitespace. Every rule can be switched off from the
//! `[normalization]` table of the config file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static RE_HYPHEN_LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\r?\n[ \t]*(\p{L})").unwrap());
static RE_NUMERIC_BRACKET_CITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\d+(?:\s*[,\-–]\s*\d+)*\s*\]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizerConfig {
    pub enabled: bool,
    pub join_hyphenated_line_breaks: bool,
    pub drop_numeric_bracket_citations: bool,
    pub collapse_whitespace: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            join_hyphenated_line_breaks: true,
            drop_numeric_bracket_citations: true,
            collapse_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NarrationNormalizer {
    config: NormalizerConfig,
}

impl NarrationNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, text: &str) -> String {
        if !self.config.enabled {
            return text.to_string();
        }

        let mut out: String = text.nfc().collect();
        if self.config.join_hyphenated_line_breaks {
            out = RE_HYPHEN_LINE_BREAK.replace_all(&out, "$1$2").into_owned();
        }
        if self.config.drop_numeric_bracket_citations {
            out = RE_NUMERIC_BRACKET_CITE.replace_all(&out, "").into_owned();
        }
        if self.config.collapse_whitespace {
            out = RE_WHITESPACE.replace_all(&out, " ").into_owned();
            out = RE_SPACE_BEFORE_PUNCT.replace_all(&out, "$1").into_owned();
        }
        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_words_split_across_lines() {
        let normalizer = NarrationNormalizer::default();
        assert_eq!(
            normalizer.normalize("a consti-\ntuição federal"),
            "a constituição federal"
        );
    }

    #[test]
    fn drops_citations_and_collapses_whitespace() {
        let normalizer = NarrationNormalizer::default();
        assert_eq!(
            normalizer.normalize("Direito civil [12]  e   penal [3, 4] .\n\nFim"),
            "Direito civil e penal. Fim"
        );
    }

    #[test]
    fn composes_decomposed_accents() {
        let normalizer = NarrationNormalizer::default();
        let decomposed = "ac\u{0327}a\u{0303}o";
        assert_eq!(normalizer.normalize(decomposed), "ação");
    }

    #[test]
    fn disabled_normalizer_is_identity() {
        let normalizer = NarrationNormalizer::new(NormalizerConfig {
            enabled: false,
            ..NormalizerConfig::default()
        });
        assert_eq!(normalizer.normalize("  x [1]\n"), "  x [1]\n");
    }

    #[test]
    fn empty_page_stays_empty() {
        assert_eq!(NarrationNormalizer::default().normalize(" \n "), "");
    }
}
