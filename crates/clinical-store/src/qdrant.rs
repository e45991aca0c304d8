//! Qdrant REST client.
//!
//! Talks to Qdrant over its HTTP API. Points are keyed by the record's
//! deterministic UUID, so upserting the same source path overwrites the
//! previous point. Writes use `wait=true` so a completed upsert is
//! immediately visible to searches.
//!
//! Alongside the typed payload, each point carries a derived
//! `document_ts` float (the document date at midnight UTC, as unix
//! seconds) so date windows can be pushed down as range filters.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use clinical_types::{ClinicalRecord, Modality, RecordPayload};

use crate::error::StoreError;
use crate::store::{RecordFilter, ScoredRecord, VectorStore};

const TIMESTAMP_FIELD: &str = "document_ts";

/// Payload fields indexed for filtering. Filtering on an unindexed
/// field is a hard error on managed clusters.
const KEYWORD_INDEXES: &[&str] = &["patient_id", "category", "modality"];

/// Qdrant-backed vector store over the REST API.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct RetrievedPoint {
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RetrievedPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

/// Unix seconds for a document date, pinned to midnight UTC.
fn date_to_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn filter_to_json(filter: &RecordFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(patient_id) = &filter.patient_id {
        must.push(json!({ "key": "patient_id", "match": { "value": patient_id } }));
    }
    if let Some(category) = &filter.category {
        must.push(json!({ "key": "category", "match": { "value": category } }));
    }
    if let Some((start, end)) = &filter.date_range {
        must.push(json!({
            "key": TIMESTAMP_FIELD,
            "range": { "gte": date_to_ts(*start), "lte": date_to_ts(*end) }
        }));
    }
    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn payload_from_value(value: Option<Value>) -> Result<RecordPayload, StoreError> {
    let value = value
        .ok_or_else(|| StoreError::InvalidResponse("point returned without payload".to_string()))?;
    Ok(serde_json::from_value(value)?)
}

impl QdrantStore {
    /// Build a client for the given Qdrant endpoint.
    pub fn new(
        url: &str,
        api_key: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key.expose_secret().trim()).map_err(|_| {
                StoreError::InvalidResponse("store API key is not a valid header value".to_string())
            })?;
            headers.insert("api-key", value);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read the response body, mapping non-success statuses to `Rejected`.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: ApiResponse<T> = response.json().await?;
        Ok(envelope.result)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{}/exists", name)))
            .send()
            .await?;
        let result: ExistsResult = Self::read_json(response).await?;
        Ok(result.exists)
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), StoreError> {
        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        let response = self
            .client
            .put(self.url(&format!("/collections/{}", name)))
            .json(&body)
            .send()
            .await?;
        Self::read_json::<Value>(response).await?;
        info!(collection = name, dimension, "Created collection");
        Ok(())
    }

    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        schema: &str,
    ) -> Result<(), StoreError> {
        let body = json!({ "field_name": field, "field_schema": schema });
        let response = self
            .client
            .put(self.url(&format!("/collections/{}/index", collection)))
            .json(&body)
            .send()
            .await?;
        match Self::read_json::<Value>(response).await {
            Ok(_) => Ok(()),
            // Re-running setup against an existing collection is normal.
            Err(StoreError::Rejected { body, .. })
                if body.to_lowercase().contains("already exists") =>
            {
                debug!(collection, field, "Payload index already present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_from_collection(
        &self,
        collection: &str,
        record_id: &str,
    ) -> Result<(), StoreError> {
        let body = json!({ "points": [record_id] });
        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points/delete?wait=true", collection)))
            .json(&body)
            .send()
            .await?;
        Self::read_json::<Value>(response).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collections(&self) -> Result<(), StoreError> {
        for modality in [Modality::Text, Modality::Image] {
            let name = modality.collection();
            if !self.collection_exists(name).await? {
                self.create_collection(name, modality.dimension()).await?;
            }
            for field in KEYWORD_INDEXES {
                self.create_payload_index(name, field, "keyword").await?;
            }
            self.create_payload_index(name, TIMESTAMP_FIELD, "float")
                .await?;
        }
        Ok(())
    }

    async fn upsert(&self, record: &ClinicalRecord) -> Result<(), StoreError> {
        let collection = record.modality.collection();
        if record.vector.len() != record.modality.dimension() {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: record.modality.dimension(),
                actual: record.vector.len(),
            });
        }

        let mut payload = serde_json::to_value(record.payload())?;
        if let (Value::Object(map), Some(date)) = (&mut payload, record.document_date) {
            map.insert(TIMESTAMP_FIELD.to_string(), json!(date_to_ts(date)));
        }

        let body = json!({
            "points": [{
                "id": record.record_id,
                "vector": record.vector,
                "payload": payload,
            }]
        });
        let response = self
            .client
            .put(self.url(&format!("/collections/{}/points?wait=true", collection)))
            .json(&body)
            .send()
            .await?;
        Self::read_json::<Value>(response).await?;
        debug!(
            collection,
            record_id = %record.record_id,
            patient_id = %record.patient_id,
            "Upserted record"
        );
        Ok(())
    }

    async fn fetch(
        &self,
        modality: Modality,
        record_id: &str,
    ) -> Result<Option<RecordPayload>, StoreError> {
        let body = json!({ "ids": [record_id], "with_payload": true });
        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points", modality.collection())))
            .json(&body)
            .send()
            .await?;
        let mut points: Vec<RetrievedPoint> = Self::read_json(response).await?;
        match points.pop() {
            Some(point) => Ok(Some(payload_from_value(point.payload)?)),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        modality: Modality,
        vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let collection = modality.collection();
        if vector.len() != modality.dimension() {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: modality.dimension(),
                actual: vector.len(),
            });
        }

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Value::Object(map), Some(filter_json)) = (&mut body, filter_to_json(filter)) {
            map.insert("filter".to_string(), filter_json);
        }

        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points/search", collection)))
            .json(&body)
            .send()
            .await?;
        let points: Vec<ScoredPoint> = Self::read_json(response).await?;

        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            let payload = payload_from_value(point.payload)?;
            hits.push(ScoredRecord {
                record_id: payload.record_id.clone(),
                score: point.score,
                payload,
            });
        }
        debug!(collection, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    async fn scroll(
        &self,
        modality: Modality,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<RecordPayload>, StoreError> {
        let collection = modality.collection();
        let filter_json = filter_to_json(filter);
        let mut payloads = Vec::new();
        let mut offset: Option<Value> = None;

        while payloads.len() < limit {
            let page = (limit - payloads.len()).min(256);
            let mut body = json!({
                "limit": page,
                "with_payload": true,
                "with_vector": false,
            });
            if let Value::Object(map) = &mut body {
                if let Some(filter_json) = &filter_json {
                    map.insert("filter".to_string(), filter_json.clone());
                }
                if let Some(offset) = &offset {
                    map.insert("offset".to_string(), offset.clone());
                }
            }

            let response = self
                .client
                .post(self.url(&format!("/collections/{}/points/scroll", collection)))
                .json(&body)
                .send()
                .await?;
            let result: ScrollResult = Self::read_json(response).await?;
            for point in result.points {
                payloads.push(payload_from_value(point.payload)?);
            }
            match result.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(payloads)
    }

    async fn delete(&self, record_id: &str) -> Result<bool, StoreError> {
        let mut found = false;
        for modality in [Modality::Text, Modality::Image] {
            if self.fetch(modality, record_id).await?.is_some() {
                self.delete_from_collection(modality.collection(), record_id)
                    .await?;
                found = true;
            }
        }
        if !found {
            warn!(record_id, "Delete requested for unknown record");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_ts_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        assert_eq!(date_to_ts(date), 1_685_577_600);
    }

    #[test]
    fn test_empty_filter_is_omitted() {
        assert!(filter_to_json(&RecordFilter::default()).is_none());
    }

    #[test]
    fn test_filter_json_shape() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let filter = RecordFilter::for_patient("P001")
            .with_category("cardiac")
            .with_date_range(start, end);

        let json = filter_to_json(&filter).unwrap();
        let must = json["must"].as_array().unwrap();
        assert_eq!(must.len(), 3);
        assert_eq!(must[0]["key"], "patient_id");
        assert_eq!(must[0]["match"]["value"], "P001");
        assert_eq!(must[2]["key"], TIMESTAMP_FIELD);
        assert!(must[2]["range"]["gte"].is_i64());
    }

    #[test]
    fn test_payload_from_value_requires_payload() {
        assert!(payload_from_value(None).is_err());
    }
}
