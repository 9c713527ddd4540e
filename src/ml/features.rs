use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Vocabulary cap for the TF-IDF vector
pub const MAX_VOCAB_SIZE: usize = 10_000;

/// Minimum document frequency for a term to enter the vocabulary
const MIN_DOC_FREQ: usize = 2;

static URGENCY_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "urgent", "critical", "immediately", "outage", "down", "failed", "failure", "breach",
        "emergency", "severe", "blocked", "stuck", "halted", "crashed",
    ]
    .into_iter()
    .collect()
});

static SYSTEM_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "db2", "oracle", "cics", "mq", "racf", "sap", "kafka", "redis", "postgres", "vsam",
        "ims", "websphere", "tomcat",
    ]
    .into_iter()
    .collect()
});

static ABEND_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(S0C[0-9B]|U\d{4}|SQL\d{3,5}[NC]?|ORA-\d{5})\b").unwrap());

/// Technical signals mined from incident text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalSignals {
    /// Count of urgency-lexicon hits
    pub urgency_hits: usize,

    /// Recognized system names, lowercased
    pub system_names: Vec<String>,

    /// True when an abend/error code was found
    pub has_abend_code: bool,

    /// Affected-user count carried over from the incident
    pub affected_users: u64,
}

/// The full feature set for one incident
#[derive(Debug, Clone, Default)]
pub struct IncidentFeatures {
    /// Normalized token stream (lowercased, punctuation stripped, short
    /// words dropped)
    pub tokens: Vec<String>,

    /// Sparse TF-IDF weights for vocabulary terms present in the text.
    /// Empty when the extractor is unfitted or the text is empty.
    pub tfidf: HashMap<String, f64>,

    /// Technical signal dictionary
    pub signals: TechnicalSignals,
}

impl IncidentFeatures {
    /// "No signal": nothing for any scorer to work with
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Deterministic text-to-features converter.
///
/// Extraction is total: empty or whitespace-only text yields an empty
/// feature set, never an error. The TF-IDF vocabulary is built by `fit` and
/// capped at [`MAX_VOCAB_SIZE`] terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    /// Term -> vector index
    vocabulary: HashMap<String, usize>,

    /// Term -> inverse document frequency
    idf_values: HashMap<String, f64>,

    is_fitted: bool,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            vocabulary: HashMap::new(),
            idf_values: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Normalized token stream for a piece of text
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|w| !w.is_empty() && w.len() > 2)
            .map(|w| w.to_string())
            .collect()
    }

    /// Build the capped vocabulary and IDF table from a corpus
    pub fn fit(&mut self, texts: &[String]) {
        let mut term_doc_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let unique: HashSet<String> = Self::tokenize(text).into_iter().collect();
            for term in unique {
                *term_doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut vocab_list: Vec<(String, usize)> = term_doc_freq
            .into_iter()
            .filter(|(_, freq)| *freq >= MIN_DOC_FREQ)
            .collect();

        // Sort by frequency, ties by term, then cap the vocabulary
        vocab_list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        vocab_list.truncate(MAX_VOCAB_SIZE);

        let n_docs = texts.len() as f64;
        self.idf_values = vocab_list
            .iter()
            .map(|(term, doc_freq)| {
                let idf = (n_docs / (1.0 + *doc_freq as f64)).ln() + 1.0;
                (term.clone(), idf)
            })
            .collect();

        self.vocabulary = vocab_list
            .into_iter()
            .enumerate()
            .map(|(idx, (term, _))| (term, idx))
            .collect();

        self.is_fitted = true;
    }

    /// Extract the full feature set for an incident's text
    pub fn extract(&self, text: &str, affected_users: u64) -> IncidentFeatures {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return IncidentFeatures {
                signals: TechnicalSignals {
                    affected_users,
                    ..Default::default()
                },
                ..Default::default()
            };
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let tfidf = if self.is_fitted {
            counts
                .iter()
                .filter_map(|(term, count)| {
                    self.idf_values
                        .get(*term)
                        .map(|idf| (term.to_string(), *count as f64 * idf))
                })
                .collect()
        } else {
            HashMap::new()
        };

        let urgency_hits = tokens
            .iter()
            .filter(|t| URGENCY_TOKENS.contains(t.as_str()))
            .count();

        let mut system_names: Vec<String> = tokens
            .iter()
            .filter(|t| SYSTEM_NAMES.contains(t.as_str()))
            .cloned()
            .collect();
        system_names.sort();
        system_names.dedup();

        IncidentFeatures {
            signals: TechnicalSignals {
                urgency_hits,
                system_names,
                has_abend_code: ABEND_CODE.is_match(text),
                affected_users,
            },
            tokens,
            tfidf,
        }
    }

    /// Dense TF-IDF vector over the fitted vocabulary, for the ML models.
    /// Returns an all-zero vector for unknown or empty text.
    pub fn transform_vec(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        if !self.is_fitted {
            return vector;
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in Self::tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }

        for (term, count) in counts {
            if let (Some(&idx), Some(idf)) =
                (self.vocabulary.get(&term), self.idf_values.get(&term))
            {
                vector[idx] = count as f64 * idf;
            }
        }

        vector
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
