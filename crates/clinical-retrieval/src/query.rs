//! Query request and outcome types.

use chrono::NaiveDate;

use clinical_store::{RecordFilter, ScoredRecord};

/// Which collections a query searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryScope {
    /// Text reports only
    #[default]
    Text,
    /// Medical images only (needs a cross-modal encoder)
    Image,
    /// Both collections, merged into one ranking
    All,
}

impl QueryScope {
    pub fn includes_text(&self) -> bool {
        matches!(self, QueryScope::Text | QueryScope::All)
    }

    pub fn includes_image(&self) -> bool {
        matches!(self, QueryScope::Image | QueryScope::All)
    }
}

/// A natural-language query with optional metadata constraints.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// The query text to embed
    pub text: String,
    /// Restrict to one patient
    pub patient_id: Option<String>,
    /// Restrict to one clinical category
    pub category: Option<String>,
    /// Inclusive document date window
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Collections to search
    pub scope: QueryScope,
    /// Maximum hits returned
    pub top_k: usize,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            patient_id: None,
            category: None,
            date_range: None,
            scope: QueryScope::default(),
            top_k: 5,
        }
    }

    pub fn for_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn with_scope(mut self, scope: QueryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The store-level filter for this request.
    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            patient_id: self.patient_id.clone(),
            category: self.category.clone(),
            date_range: self.date_range,
        }
    }
}

/// Whether a query matched anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// At least one record matched
    Ok,
    /// The query ran fine but nothing matched the constraints
    NoResults,
}

/// Ranked result of a query.
#[derive(Debug)]
pub struct QueryOutcome {
    pub status: QueryStatus,
    /// Hits in final ranked order, at most `top_k`
    pub hits: Vec<ScoredRecord>,
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
