//! Message embeddings. Backends implement [`Embedder`]; [`HashingEmbedder`] is the built-in one.

use crate::error::EmbeddingError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const HASHING_EMBEDDER: &str = "hashing";

const WORD_WEIGHT: f64 = 1.0;
const NGRAM_WEIGHT: f64 = 0.5;

/// Maps N messages to an N x D matrix. D is fixed for the lifetime of a model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    fn embed(&self, messages: &[&str]) -> Result<Array2<f64>, EmbeddingError>;

    /// Identity stored alongside fitted artifacts so inference can rebuild the same backend
    fn spec(&self) -> EmbeddingSpec;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    pub name: String,
    pub dim: usize,
    #[serde(default)]
    pub char_ngram: usize,
}

/// Signed feature hashing of lowercase words and their character n-grams, L2-normalised.
/// Deterministic across processes and independent of batch composition.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    char_ngram: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize, char_ngram: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::Unavailable(
                "hashing embedder needs at least one dimension".to_string(),
            ));
        }
        Ok(Self { dim, char_ngram })
    }

    pub fn from_config(config: &crate::config::EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::new(config.dim, config.char_ngram)
    }

    pub fn from_spec(spec: &EmbeddingSpec) -> Result<Self, EmbeddingError> {
        if spec.name != HASHING_EMBEDDER {
            return Err(EmbeddingError::Unavailable(format!(
                "no built-in embedder named {:?}",
                spec.name
            )));
        }
        Self::new(spec.dim, spec.char_ngram)
    }

    fn bucket(&self, kind: u8, token: &str) -> (usize, f64) {
        let mut h = Sha256::new();
        h.update([kind]);
        h.update(token.as_bytes());
        let digest = h.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let v = u64::from_le_bytes(word);
        let sign = if v >> 63 == 0 { 1.0 } else { -1.0 };
        ((v % self.dim as u64) as usize, sign)
    }

    fn embed_one(&self, message: &str, out: &mut [f64]) {
        for word in message.split_whitespace() {
            let word = word.to_lowercase();
            let (i, sign) = self.bucket(b'w', &word);
            out[i] += sign * WORD_WEIGHT;

            if self.char_ngram == 0 {
                continue;
            }
            let padded: Vec<char> = std::iter::once('<')
                .chain(word.chars())
                .chain(std::iter::once('>'))
                .collect();
            if padded.len() <= self.char_ngram {
                continue;
            }
            for gram in padded.windows(self.char_ngram) {
                let gram: String = gram.iter().collect();
                let (i, sign) = self.bucket(b'g', &gram);
                out[i] += sign * NGRAM_WEIGHT;
            }
        }

        let norm = out.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            out.iter_mut().for_each(|v| *v /= norm);
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, messages: &[&str]) -> Result<Array2<f64>, EmbeddingError> {
        let mut out = Array2::<f64>::zeros((messages.len(), self.dim));
        for (mut row, message) in out.rows_mut().into_iter().zip(messages) {
            // rows of a fresh standard-layout array are contiguous
            if let Some(slice) = row.as_slice_mut() {
                self.embed_one(message, slice);
            }
        }
        Ok(out)
    }

    fn spec(&self) -> EmbeddingSpec {
        EmbeddingSpec {
            name: HASHING_EMBEDDER.to_string(),
            dim: self.dim,
            char_ngram: self.char_ngram,
        }
    }
}
