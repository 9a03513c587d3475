// Turn raw intake form values into typed, nullable values for storage.
// Empty strings become NULL, numeric fields are parsed, everything else
// passes through. A value that cannot be represented is rejected, never stored.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::models::{IntakePayload, RawValue, ReportReference, SanitizedIntake};

/// Fields stored as numbers. Every other field is text, an enum label, or a date.
pub const NUMERIC_FIELDS: &[&str] = &[
    "age",
    "height_cm",
    "weight_kg",
    "waist_circumference",
    "bp_systolic",
    "bp_diastolic",
    "ast",
    "alt",
    "ggt",
    "triglycerides",
    "hdl_cholesterol",
    "hba1c",
    "fasting_glucose",
    "fibroscan_kpa",
];

/// Result of sanitising one field.
#[derive(Debug, Clone, PartialEq)]
pub enum SanitizedValue {
    Null,
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SanitizeError {
    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("{field} has an unrecognised value {value:?}")]
    InvalidChoice { field: String, value: String },

    #[error("{field} must be a date in YYYY-MM-DD form, got {value:?}")]
    InvalidDate { field: String, value: String },
}

pub fn is_numeric_field(name: &str) -> bool {
    NUMERIC_FIELDS.contains(&name)
}

/// Sanitise a single raw field value.
///
/// - absent or empty (after trimming) → `Null`
/// - numeric field → finite `Number`, or `InvalidNumber`
/// - anything else → `Text`, unchanged
pub fn sanitize_field(name: &str, raw: Option<&RawValue>) -> Result<SanitizedValue, SanitizeError> {
    let raw = match raw {
        None => return Ok(SanitizedValue::Null),
        Some(RawValue::Text(s)) if s.trim().is_empty() => return Ok(SanitizedValue::Null),
        Some(raw) => raw,
    };

    if is_numeric_field(name) {
        return parse_number(name, raw).map(SanitizedValue::Number);
    }

    Ok(match raw {
        RawValue::Text(s) => SanitizedValue::Text(s.clone()),
        RawValue::Number(n) => SanitizedValue::Text(n.to_string()),
    })
}

/// Locale-agnostic decimal parse. `.` is the only separator; NaN and
/// infinities are refused even though `f64::from_str` accepts them.
fn parse_number(name: &str, raw: &RawValue) -> Result<f64, SanitizeError> {
    let (parsed, shown) = match raw {
        RawValue::Number(n) => (Some(*n), n.to_string()),
        RawValue::Text(s) => (s.trim().parse::<f64>().ok(), s.clone()),
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(SanitizeError::InvalidNumber {
            field: name.to_string(),
            value: shown,
        }),
    }
}

/// Sanitise a full submission into the typed row shape.
pub fn sanitize_intake(payload: &IntakePayload) -> Result<SanitizedIntake, SanitizeError> {
    Ok(SanitizedIntake {
        name: text("name", payload.name.as_ref())?,
        mobile: text("mobile", payload.mobile.as_ref())?,
        date_of_birth: date("date_of_birth", payload.date_of_birth.as_ref())?,
        age: number("age", payload.age.as_ref())?,
        sex: choice("sex", payload.sex.as_ref())?,
        state: text("state", payload.state.as_ref())?,
        height_cm: number("height_cm", payload.height_cm.as_ref())?,
        weight_kg: number("weight_kg", payload.weight_kg.as_ref())?,
        waist_circumference: number("waist_circumference", payload.waist_circumference.as_ref())?,
        bp_systolic: number("bp_systolic", payload.bp_systolic.as_ref())?,
        bp_diastolic: number("bp_diastolic", payload.bp_diastolic.as_ref())?,
        ast: number("ast", payload.ast.as_ref())?,
        alt: number("alt", payload.alt.as_ref())?,
        ggt: number("ggt", payload.ggt.as_ref())?,
        triglycerides: number("triglycerides", payload.triglycerides.as_ref())?,
        hdl_cholesterol: number("hdl_cholesterol", payload.hdl_cholesterol.as_ref())?,
        hba1c: number("hba1c", payload.hba1c.as_ref())?,
        fasting_glucose: number("fasting_glucose", payload.fasting_glucose.as_ref())?,
        fibroscan_kpa: number("fibroscan_kpa", payload.fibroscan_kpa.as_ref())?,
        biopsy_result: choice("biopsy_result", payload.biopsy_result.as_ref())?,
        diagnosis_group: choice("diagnosis_group", payload.diagnosis_group.as_ref())?,
        report_files: payload.report_files.clone().unwrap_or_default(),
    })
}

fn number(name: &str, raw: Option<&RawValue>) -> Result<Option<f64>, SanitizeError> {
    match sanitize_field(name, raw)? {
        SanitizedValue::Number(n) => Ok(Some(n)),
        _ => Ok(None),
    }
}

fn text(name: &str, raw: Option<&RawValue>) -> Result<Option<String>, SanitizeError> {
    match sanitize_field(name, raw)? {
        SanitizedValue::Text(s) => Ok(Some(s)),
        SanitizedValue::Number(n) => Ok(Some(n.to_string())),
        SanitizedValue::Null => Ok(None),
    }
}

fn choice<T: FromStr>(name: &str, raw: Option<&RawValue>) -> Result<Option<T>, SanitizeError> {
    let Some(label) = text(name, raw)? else {
        return Ok(None);
    };
    label
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| SanitizeError::InvalidChoice {
            field: name.to_string(),
            value: label,
        })
}

fn date(name: &str, raw: Option<&RawValue>) -> Result<Option<NaiveDate>, SanitizeError> {
    let Some(value) = text(name, raw)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| SanitizeError::InvalidDate {
            field: name.to_string(),
            value,
        })
}

/// Serialise report references for the JSON column. An empty list is `[]`.
pub fn encode_report_files(files: &[ReportReference]) -> Result<String, serde_json::Error> {
    serde_json::to_string(files)
}

/// Inverse of [`encode_report_files`].
pub fn decode_report_files(column: &str) -> Result<Vec<ReportReference>, serde_json::Error> {
    serde_json::from_str(column)
}
