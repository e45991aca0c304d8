//! Deterministic local encoders for tests and offline development.
//!
//! The stub text encoder hashes tokens into a fixed-size bag-of-words
//! vector, so texts sharing vocabulary score a positive cosine similarity
//! and unrelated texts score near zero. The stub image encoder derives its
//! vector from a digest of the pixel bytes, so identical images map to
//! identical vectors. Neither captures real semantics.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use clinical_types::record::{IMAGE_DIMENSION, TEXT_DIMENSION};
use clinical_types::PixelBuffer;

use crate::encoder::{
    check_image_input, check_text_input, Embedding, EncoderInfo, ImageEncoder, TextEncoder,
};
use crate::error::EmbeddingError;

fn token_bucket(token: &str, dimension: usize) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut value: u64 = 0;
    for byte in &digest[..8] {
        value = (value << 8) | u64::from(*byte);
    }
    (value % dimension as u64) as usize
}

fn bag_of_words(text: &str, dimension: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; dimension];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        values[token_bucket(&token.to_lowercase(), dimension)] += 1.0;
    }
    values
}

/// Deterministic text encoder over a hashed bag-of-words.
pub struct StubTextEncoder {
    info: EncoderInfo,
}

impl StubTextEncoder {
    pub fn new() -> Self {
        Self::with_dimension(TEXT_DIMENSION)
    }

    /// Stub with an explicit output dimension, e.g. a 512-dim stand-in
    /// for a cross-modal text tower.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            info: EncoderInfo {
                name: "stub-bag-of-words".to_string(),
                version: "1".to_string(),
                dimension,
            },
        }
    }
}

impl Default for StubTextEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEncoder for StubTextEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    async fn embed_text(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        check_text_input(text)?;
        Ok(Embedding::new(bag_of_words(text, self.info.dimension)))
    }
}

/// Deterministic image encoder over a pixel digest.
pub struct StubImageEncoder {
    info: EncoderInfo,
}

impl StubImageEncoder {
    pub fn new() -> Self {
        Self {
            info: EncoderInfo {
                name: "stub-pixel-digest".to_string(),
                version: "1".to_string(),
                dimension: IMAGE_DIMENSION,
            },
        }
    }
}

impl Default for StubImageEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEncoder for StubImageEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    async fn embed_image(&self, pixels: &PixelBuffer) -> Result<Embedding, EmbeddingError> {
        check_image_input(pixels)?;
        let digest = Sha256::digest(&pixels.data);
        let values: Vec<f32> = (0..self.info.dimension)
            .map(|i| f32::from(digest[i % digest.len()]) + 1.0)
            .collect();
        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_stub_is_deterministic() {
        let encoder = StubTextEncoder::new();
        let a = encoder.embed_text("chest pain on exertion").await.unwrap();
        let b = encoder.embed_text("chest pain on exertion").await.unwrap();
        assert_eq!(a.values, b.values);
        assert_eq!(a.dimension(), TEXT_DIMENSION);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let encoder = StubTextEncoder::new();
        let query = encoder.embed_text("cardiac stress test").await.unwrap();
        let related = encoder
            .embed_text("cardiac stress test results normal")
            .await
            .unwrap();
        let unrelated = encoder
            .embed_text("dermatology biopsy benign nevus")
            .await
            .unwrap();
        assert!(query.cosine_similarity(&related) > query.cosine_similarity(&unrelated));
    }

    #[tokio::test]
    async fn test_text_stub_rejects_empty_input() {
        let encoder = StubTextEncoder::new();
        assert!(matches!(
            encoder.embed_text("   ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_image_stub_is_deterministic() {
        let encoder = StubImageEncoder::new();
        let pixels = PixelBuffer::new(2, 2, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120])
            .unwrap();
        let a = encoder.embed_image(&pixels).await.unwrap();
        let b = encoder.embed_image(&pixels).await.unwrap();
        assert_eq!(a.values, b.values);
        assert_eq!(a.dimension(), IMAGE_DIMENSION);
    }

    #[tokio::test]
    async fn test_different_images_produce_different_vectors() {
        let encoder = StubImageEncoder::new();
        let a = encoder
            .embed_image(&PixelBuffer::new(1, 1, vec![0, 0, 0]).unwrap())
            .await
            .unwrap();
        let b = encoder
            .embed_image(&PixelBuffer::new(1, 1, vec![255, 255, 255]).unwrap())
            .await
            .unwrap();
        assert_ne!(a.values, b.values);
    }

    #[test]
    fn test_token_bucket_stability() {
        assert_eq!(
            token_bucket("cardiac", TEXT_DIMENSION),
            token_bucket("cardiac", TEXT_DIMENSION)
        );
    }
}
