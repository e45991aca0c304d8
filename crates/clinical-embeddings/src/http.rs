//! Remote inference encoder clients.
//!
//! Both encoders talk JSON-over-HTTP to an inference endpoint. Requests
//! are not retried here: encoder failures surface to the caller, and any
//! retry-with-backoff policy belongs to the ingestion layer.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use clinical_types::record::{IMAGE_DIMENSION, TEXT_DIMENSION};
use clinical_types::PixelBuffer;

use crate::encoder::{
    check_dimension, check_image_input, check_text_input, Embedding, EncoderInfo, ImageEncoder,
    TextEncoder,
};
use crate::error::EmbeddingError;

fn build_client(
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, EmbeddingError> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key {
        let value = HeaderValue::from_str(key.trim())
            .map_err(|_| EmbeddingError::InvalidInput("invalid encoder API key".to_string()))?;
        headers.insert("api-key", value);
    }
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()?)
}

#[derive(Serialize)]
struct TextInferenceRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceData>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceResponse {
    fn into_first_embedding(self) -> Result<Vec<f32>, EmbeddingError> {
        if !self.data.is_empty() {
            let mut data = self.data;
            data.sort_by_key(|d| d.index.unwrap_or(0));
            return Ok(data.remove(0).embedding);
        }
        if let Some(first) = self.embeddings.into_iter().next() {
            return Ok(first);
        }
        Err(EmbeddingError::Encoder(
            "inference response missing embedding payload".to_string(),
        ))
    }
}

async fn read_embedding(response: reqwest::Response) -> Result<Vec<f32>, EmbeddingError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(EmbeddingError::Encoder(format!(
            "inference request failed ({}): {}",
            status, body
        )));
    }
    let payload: InferenceResponse = response.json().await?;
    payload.into_first_embedding()
}

/// Text encoder backed by a remote inference endpoint (768-dim space).
pub struct HttpTextEncoder {
    client: reqwest::Client,
    endpoint: String,
    info: EncoderInfo,
}

impl HttpTextEncoder {
    /// Build a client for `endpoint` pinned to `model`.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        Self::with_dimension(endpoint, model, api_key, timeout, TEXT_DIMENSION)
    }

    /// Build a client with an explicit output dimension.
    ///
    /// Used for the optional cross-modal text tower, which embeds text
    /// into the 512-dim image space.
    pub fn with_dimension(
        endpoint: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            info: EncoderInfo {
                name: model.to_string(),
                version: "pinned".to_string(),
                dimension,
            },
        })
    }
}

#[async_trait]
impl TextEncoder for HttpTextEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    async fn embed_text(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        check_text_input(text)?;

        let request = TextInferenceRequest {
            model: &self.info.name,
            inputs: &[text],
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let values = read_embedding(response).await?;

        let embedding = Embedding::new(values);
        check_dimension(&self.info, &embedding)?;
        debug!(model = %self.info.name, chars = text.len(), "Embedded text");
        Ok(embedding)
    }
}

/// Image encoder backed by a remote inference endpoint (512-dim space).
///
/// The normalized pixel buffer is re-encoded as PNG and posted as the raw
/// request body; the model is pinned via a query parameter.
pub struct HttpImageEncoder {
    client: reqwest::Client,
    endpoint: String,
    info: EncoderInfo,
}

impl HttpImageEncoder {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            info: EncoderInfo {
                name: model.to_string(),
                version: "pinned".to_string(),
                dimension: IMAGE_DIMENSION,
            },
        })
    }

    fn encode_png(pixels: &PixelBuffer) -> Result<Vec<u8>, EmbeddingError> {
        let img = image::RgbImage::from_raw(pixels.width, pixels.height, pixels.data.clone())
            .ok_or_else(|| {
                EmbeddingError::InvalidInput("pixel buffer does not match dimensions".to_string())
            })?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| EmbeddingError::Encoder(format!("PNG re-encode failed: {}", e)))?;
        Ok(bytes)
    }
}

#[async_trait]
impl ImageEncoder for HttpImageEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    async fn embed_image(&self, pixels: &PixelBuffer) -> Result<Embedding, EmbeddingError> {
        check_image_input(pixels)?;

        let body = Self::encode_png(pixels)?;
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("model", self.info.name.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        let values = read_embedding(response).await?;

        let embedding = Embedding::new(values);
        check_dimension(&self.info, &embedding)?;
        debug!(model = %self.info.name, width = pixels.width, height = pixels.height, "Embedded image");
        Ok(embedding)
    }
}
