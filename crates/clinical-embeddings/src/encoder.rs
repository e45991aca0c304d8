//! Encoder traits and the embedding value type.

use async_trait::async_trait;

use clinical_types::PixelBuffer;

use crate::error::EmbeddingError;

/// A vector in one of the two embedding spaces, held at unit length so
/// that cosine similarity reduces to a dot product.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Scale `values` to unit length. A zero vector has no direction to
    /// preserve and is stored as-is.
    pub fn new(values: Vec<f32>) -> Self {
        let length: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if length > 0.0 {
            Self {
                values: values.into_iter().map(|v| v / length).collect(),
            }
        } else {
            Self { values }
        }
    }

    /// Wrap a vector that is already unit length, such as one returned
    /// by an inference service.
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity against `other`, in [-1, 1]. Vectors from
    /// different spaces are not comparable and score 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Pinned encoder identity.
///
/// Changing the model invalidates every previously stored vector in that
/// encoder's space, so the name/version pair travels with the encoder and
/// its output dimension is enforced on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// Model name (e.g. "sentence-transformers/all-mpnet-base-v2")
    pub name: String,
    /// Model version tag
    pub version: String,
    /// Output dimension
    pub dimension: usize,
}

/// Trait for text encoders (768-dimensional sentence space).
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Get encoder identity
    fn info(&self) -> &EncoderInfo;

    /// Embed a single text. Empty or whitespace-only input is rejected
    /// before the model is invoked.
    async fn embed_text(&self, text: &str) -> Result<Embedding, EmbeddingError>;
}

/// Trait for image encoders (512-dimensional vision space).
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    /// Get encoder identity
    fn info(&self) -> &EncoderInfo;

    /// Embed a decoded image buffer. Empty buffers are rejected before
    /// the model is invoked.
    async fn embed_image(&self, pixels: &PixelBuffer) -> Result<Embedding, EmbeddingError>;
}

/// Reject text input the model cannot meaningfully embed.
pub(crate) fn check_text_input(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::InvalidInput(
            "cannot embed empty or whitespace-only text".to_string(),
        ));
    }
    Ok(())
}

/// Largest width/height the image encoders accept. The document
/// processor downscales to this bound; anything bigger reaching an
/// encoder is a pipeline bug, not a model concern.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// Reject image input the model cannot meaningfully embed.
pub(crate) fn check_image_input(pixels: &PixelBuffer) -> Result<(), EmbeddingError> {
    if pixels.is_empty() {
        return Err(EmbeddingError::InvalidInput(
            "cannot embed an empty pixel buffer".to_string(),
        ));
    }
    if pixels.width > MAX_IMAGE_DIMENSION || pixels.height > MAX_IMAGE_DIMENSION {
        return Err(EmbeddingError::InvalidInput(format!(
            "pixel buffer {}x{} exceeds the {} pixel bound",
            pixels.width, pixels.height, MAX_IMAGE_DIMENSION
        )));
    }
    Ok(())
}

/// Enforce the encoder's pinned output dimension.
pub(crate) fn check_dimension(
    info: &EncoderInfo,
    embedding: &Embedding,
) -> Result<(), EmbeddingError> {
    if embedding.dimension() != info.dimension {
        return Err(EmbeddingError::DimensionMismatch {
            encoder: info.name.clone(),
            expected: info.dimension,
            actual: embedding.dimension(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scales_to_unit_length() {
        let emb = Embedding::new(vec![2.0, -1.0, 0.5, 3.0]);
        let length: f32 = emb.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((length - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_survives_normalization() {
        let emb = Embedding::new(vec![0.0; 4]);
        assert_eq!(emb.values, vec![0.0; 4]);
    }

    #[test]
    fn test_vector_scores_one_against_itself() {
        let emb = Embedding::new(vec![0.3, 0.7, 0.1]);
        assert!((emb.cosine_similarity(&emb) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_dimensions_are_not_comparable() {
        let text_like = Embedding::new(vec![1.0; 768]);
        let image_like = Embedding::new(vec![1.0; 512]);
        assert_eq!(text_like.cosine_similarity(&image_like), 0.0);
    }

    #[test]
    fn test_check_text_input_rejects_whitespace() {
        assert!(check_text_input("  \n\t ").is_err());
        assert!(check_text_input("findings").is_ok());
    }

    #[test]
    fn test_check_image_input_rejects_oversized_buffer() {
        use clinical_types::PixelBuffer;

        let wide = PixelBuffer::new(MAX_IMAGE_DIMENSION + 1, 1, vec![0; (MAX_IMAGE_DIMENSION as usize + 1) * 3])
            .unwrap();
        assert!(matches!(
            check_image_input(&wide),
            Err(EmbeddingError::InvalidInput(_))
        ));

        let small = PixelBuffer::new(1, 1, vec![0; 3]).unwrap();
        assert!(check_image_input(&small).is_ok());
    }

    #[test]
    fn test_check_dimension() {
        let info = EncoderInfo {
            name: "stub".to_string(),
            version: "1".to_string(),
            dimension: 4,
        };
        assert!(check_dimension(&info, &Embedding::new(vec![1.0; 4])).is_ok());
        assert!(matches!(
            check_dimension(&info, &Embedding::new(vec![1.0; 5])),
            Err(EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 5,
                ..
            })
        ));
    }
}
