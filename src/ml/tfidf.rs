//! TF-IDF vectorizer for text feature extraction.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;

/// TF-IDF vectorizer.
///
/// Fit assigns vocabulary indices in first-seen token order, so fitting the
/// same documents always produces the same feature layout regardless of hash
/// seeding. The whole struct serializes into artifact parameter blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    /// Tokenizer shared between fit and transform.
    tokenizer: Tokenizer,
    /// Vocabulary: word -> feature index.
    vocabulary: AHashMap<String, usize>,
    /// Inverse document frequency per feature index.
    idf: Vec<f64>,
    /// Number of documents seen during fit.
    n_documents: usize,
}

impl TfIdfVectorizer {
    /// Create an unfitted vectorizer.
    pub fn new(tokenizer: Tokenizer) -> Self {
        TfIdfVectorizer {
            tokenizer,
            vocabulary: AHashMap::new(),
            idf: Vec::new(),
            n_documents: 0,
        }
    }

    /// Fit the vocabulary and IDF table on training documents.
    pub fn fit(&mut self, documents: &[String]) {
        self.n_documents = documents.len();
        let mut vocabulary: AHashMap<String, usize> = AHashMap::new();
        let mut document_frequency: AHashMap<usize, usize> = AHashMap::new();

        for doc in documents {
            let mut seen_in_doc = Vec::new();
            for token in self.tokenizer.tokenize(doc) {
                let next_index = vocabulary.len();
                let index = *vocabulary.entry(token).or_insert(next_index);
                if !seen_in_doc.contains(&index) {
                    seen_in_doc.push(index);
                    *document_frequency.entry(index).or_insert(0) += 1;
                }
            }
        }

        // IDF = log((N + 1) / (df + 1)) + 1
        let mut idf = vec![0.0; vocabulary.len()];
        for (index, slot) in idf.iter_mut().enumerate() {
            let df = document_frequency.get(&index).copied().unwrap_or(0);
            *slot = ((self.n_documents as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
        }

        self.vocabulary = vocabulary;
        self.idf = idf;
    }

    /// Transform a document into a TF-IDF feature vector. Tokens outside the
    /// fitted vocabulary are ignored.
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let tokens = self.tokenizer.tokenize(document);
        let mut tf = vec![0.0; self.vocabulary.len()];

        for token in &tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                tf[index] += 1.0;
            }
        }

        let doc_length = tokens.len() as f64;
        if doc_length > 0.0 {
            for count in &mut tf {
                *count /= doc_length;
            }
        }

        for (index, count) in tf.iter_mut().enumerate() {
            *count *= self.idf[index];
        }

        tf
    }

    /// Raw in-vocabulary token counts for a document. Used by backends that
    /// model counts rather than weights.
    pub fn token_counts(&self, document: &str) -> Vec<f64> {
        let mut counts = vec![0.0; self.vocabulary.len()];
        for token in self.tokenizer.tokenize(document) {
            if let Some(&index) = self.vocabulary.get(&token) {
                counts[index] += 1.0;
            }
        }
        counts
    }

    /// Size of the fitted vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}
