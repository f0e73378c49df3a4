use rayon::prelude::*;

/// Default number of hash buckets per embedding
pub const DEFAULT_DIMENSION: usize = 4096;

/// Anything that maps text to a fixed-length vector.
///
/// The index and the engine only depend on this trait, so a learned model can
/// replace [`HashingEmbedder`] without touching either.
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed many texts, in order
    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.par_iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashed bag-of-words sketch.
///
/// Each token (see [`tokenize`]) is hashed with the classic `h * 31 + c` string hash
/// over UTF-16 code units (wrapping at 32 bits) and counted in bucket
/// `|h| mod dimension`. Collisions are accepted. The result is L2-normalized,
/// except that text without tokens stays all-zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token_hash(token);
        (i64::from(hash).unsigned_abs() % self.dimension as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0u32; self.dimension];

        for token in tokenize(&text.to_lowercase()) {
            counts[self.bucket(token)] += 1;
        }

        let norm = counts
            .iter()
            .map(|&c| f64::from(c) * f64::from(c))
            .sum::<f64>()
            .sqrt();

        if norm == 0.0 {
            return vec![0.0; self.dimension];
        }

        counts
            .iter()
            .map(|&c| (f64::from(c) / norm) as f32)
            .collect()
    }
}

/// Whitespace-separated tokens with leading and trailing punctuation removed,
/// so `"apples,"` and `"apples"` land in the same bucket
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
}

/// 32-bit signed rolling string hash
pub fn token_hash(token: &str) -> i32 {
    token
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
