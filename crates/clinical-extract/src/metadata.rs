//! Pattern-based metadata extraction.
//!
//! An ordered table of (pattern, field, value) rules is evaluated over the
//! filename first, then over a bounded prefix of the content. For each
//! field the first matching rule wins; a field the table cannot resolve is
//! left `None`. Extraction is a pure function of its input.

use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use clinical_types::RecordMetadata;

/// Content beyond this prefix is not scanned; clinically identifying
/// headers sit at the top of a document.
const CONTENT_SCAN_CHARS: usize = 5000;

/// Which metadata field a rule resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PatientId,
    DocumentDate,
    Category,
}

/// How a rule turns its regex captures into a field value.
enum ValueSpec {
    /// First capture group, uppercased
    CaptureUpper,
    /// Fixed tag regardless of what matched
    Const(&'static str),
    /// Parse capture groups as a date
    Date(DateFormat),
}

/// Capture-group layouts for date rules.
#[derive(Debug, Clone, Copy)]
enum DateFormat {
    /// (year, month, day), e.g. 2023-06-01 or 20230601
    YearMonthDay,
    /// (day, month, year) with 2- or 4-digit year, e.g. 01/06/2023
    DayMonthYear,
    /// (day, month-name, year), e.g. 1 Jun 2023
    MonthName,
}

struct Rule {
    field: Field,
    pattern: Regex,
    value: ValueSpec,
}

impl Rule {
    fn new(field: Field, pattern: &str, value: ValueSpec) -> Self {
        Self {
            field,
            pattern: Regex::new(pattern).expect("static rule pattern must compile"),
            value,
        }
    }
}

/// Category keyword rules shared by the filename and content tables.
/// Order matters: the first matching category wins.
const CATEGORY_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\b(cardiac|cardio|cardiology|ecg|echocardiogram)\b", "cardiac"),
    (r"(?i)\b(x[- ]?ray|mri|ct[- ]scan|ultrasound|radiology|imaging)\b", "radiology"),
    (r"(?i)\b(lab|laboratory|blood[- ]test|test[- ]results?|pathology)\b", "lab"),
    (r"(?i)\b(prescription|rx|prescribed|medications?)\b", "prescription"),
    (r"(?i)\b(emergency|urgent|acute)\b", "emergency"),
    (r"(?i)\b(discharge)\b", "discharge"),
    (r"(?i)\b(neurology|neurological)\b", "neurology"),
    (r"(?i)\b(consultation|follow[- ]?up|checkup|check[- ]up|visit)\b", "consultation"),
];

fn category_rules() -> impl Iterator<Item = Rule> {
    CATEGORY_PATTERNS
        .iter()
        .map(|(pattern, tag)| Rule::new(Field::Category, pattern, ValueSpec::Const(tag)))
}

static FILENAME_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let mut rules = vec![
        Rule::new(Field::PatientId, r"(?i)\b(P\d{3,})\b", ValueSpec::CaptureUpper),
        Rule::new(
            Field::DocumentDate,
            r"(\d{4})-(\d{2})-(\d{2})",
            ValueSpec::Date(DateFormat::YearMonthDay),
        ),
        Rule::new(
            Field::DocumentDate,
            r"\b(\d{4})(\d{2})(\d{2})\b",
            ValueSpec::Date(DateFormat::YearMonthDay),
        ),
    ];
    rules.extend(category_rules());
    rules
});

static CONTENT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let mut rules = vec![
        Rule::new(
            Field::PatientId,
            r"(?i)\bpatient\s*(?:id)?\s*[:#]\s*(P\d{3,})\b",
            ValueSpec::CaptureUpper,
        ),
        Rule::new(Field::PatientId, r"\b(P\d{3,})\b", ValueSpec::CaptureUpper),
        Rule::new(
            Field::DocumentDate,
            r"(\d{4})-(\d{2})-(\d{2})",
            ValueSpec::Date(DateFormat::YearMonthDay),
        ),
        Rule::new(
            Field::DocumentDate,
            r"(?i)date\s*:?\s*(\d{1,2})[-/](\d{1,2})[-/](\d{2,4})",
            ValueSpec::Date(DateFormat::DayMonthYear),
        ),
        Rule::new(
            Field::DocumentDate,
            r"(?i)\b(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+(\d{4})\b",
            ValueSpec::Date(DateFormat::MonthName),
        ),
        Rule::new(
            Field::DocumentDate,
            r"\b(\d{1,2})[-/](\d{1,2})[-/](\d{2,4})\b",
            ValueSpec::Date(DateFormat::DayMonthYear),
        ),
    ];
    rules.extend(category_rules());
    rules
});

/// Extract metadata from a filename alone.
pub fn extract_from_path(path: &Path) -> RecordMetadata {
    // Underscores are word characters to the regex engine, so
    // "P001_cardiac.pdf" would hide "cardiac" from \b anchors.
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    let mut meta = RecordMetadata::default();
    apply_rules(&FILENAME_RULES, &name, &mut meta);
    meta
}

/// Extract metadata from a filename and, when available, raw content.
///
/// Filename rules run first and win over content rules for the same field.
pub fn extract(path: &Path, content: Option<&str>) -> RecordMetadata {
    let mut meta = extract_from_path(path);
    if let Some(content) = content {
        let prefix = content_prefix(content);
        apply_rules(&CONTENT_RULES, prefix, &mut meta);
    }
    meta
}

fn content_prefix(content: &str) -> &str {
    match content.char_indices().nth(CONTENT_SCAN_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn apply_rules(rules: &[Rule], text: &str, meta: &mut RecordMetadata) {
    for rule in rules {
        let unresolved = match rule.field {
            Field::PatientId => meta.patient_id.is_none(),
            Field::DocumentDate => meta.document_date.is_none(),
            Field::Category => meta.category.is_none(),
        };
        if !unresolved {
            continue;
        }

        let Some(caps) = rule.pattern.captures(text) else {
            continue;
        };

        match &rule.value {
            ValueSpec::CaptureUpper => {
                if let Some(m) = caps.get(1) {
                    set_field(meta, rule.field, m.as_str().to_uppercase());
                }
            }
            ValueSpec::Const(tag) => set_field(meta, rule.field, (*tag).to_string()),
            ValueSpec::Date(format) => {
                // An implausible capture (e.g. month 13) leaves the field
                // open for later rules.
                if let Some(date) = parse_date(*format, &caps) {
                    meta.document_date = Some(date);
                }
            }
        }
    }
}

fn set_field(meta: &mut RecordMetadata, field: Field, value: String) {
    match field {
        Field::PatientId => meta.patient_id = Some(value),
        Field::Category => meta.category = Some(value),
        Field::DocumentDate => unreachable!("date fields go through parse_date"),
    }
}

fn parse_date(format: DateFormat, caps: &Captures<'_>) -> Option<NaiveDate> {
    let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    match format {
        DateFormat::YearMonthDay => {
            NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)
        }
        DateFormat::DayMonthYear => {
            let (a, b) = (num(1)?, num(2)?);
            let year = expand_year(num(3)?);
            // Day-first reading; swap when that is impossible.
            NaiveDate::from_ymd_opt(year, b, a).or_else(|| NaiveDate::from_ymd_opt(year, a, b))
        }
        DateFormat::MonthName => {
            let month = match caps.get(2)?.as_str().to_lowercase().as_str() {
                "jan" => 1,
                "feb" => 2,
                "mar" => 3,
                "apr" => 4,
                "may" => 5,
                "jun" => 6,
                "jul" => 7,
                "aug" => 8,
                "sep" => 9,
                "oct" => 10,
                "nov" => 11,
                "dec" => 12,
                _ => return None,
            };
            let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, num(1)?)
        }
    }
}

fn expand_year(year: u32) -> i32 {
    if year < 100 {
        2000 + year as i32
    } else {
        year as i32
    }
}
