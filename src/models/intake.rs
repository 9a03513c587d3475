use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{BiopsyStage, DiagnosisGroup, ReportType, Sex};

/// A raw form value as sent by the intake form.
///
/// The form holds every input as a string, but JSON numbers are accepted
/// for numeric fields too. Any other JSON type fails deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// Reference to a stored report file, embedded by value in the intake row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReference {
    pub url: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
}

/// `POST /submit` body. Field names match the form inputs.
///
/// Missing fields deserialise as absent and sanitise to NULL.
/// Unknown fields are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntakePayload {
    #[serde(default)]
    pub name: Option<RawValue>,
    #[serde(default)]
    pub mobile: Option<RawValue>,
    #[serde(default)]
    pub date_of_birth: Option<RawValue>,
    #[serde(default)]
    pub age: Option<RawValue>,
    #[serde(default)]
    pub sex: Option<RawValue>,
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub height_cm: Option<RawValue>,
    #[serde(default)]
    pub weight_kg: Option<RawValue>,
    #[serde(default)]
    pub waist_circumference: Option<RawValue>,
    #[serde(default)]
    pub bp_systolic: Option<RawValue>,
    #[serde(default)]
    pub bp_diastolic: Option<RawValue>,
    #[serde(default)]
    pub ast: Option<RawValue>,
    #[serde(default)]
    pub alt: Option<RawValue>,
    #[serde(default)]
    pub ggt: Option<RawValue>,
    #[serde(default)]
    pub triglycerides: Option<RawValue>,
    #[serde(default)]
    pub hdl_cholesterol: Option<RawValue>,
    #[serde(default)]
    pub hba1c: Option<RawValue>,
    #[serde(default)]
    pub fasting_glucose: Option<RawValue>,
    #[serde(default)]
    pub fibroscan_kpa: Option<RawValue>,
    #[serde(default)]
    pub biopsy_result: Option<RawValue>,
    #[serde(default)]
    pub diagnosis_group: Option<RawValue>,
    #[serde(default)]
    pub report_files: Option<Vec<ReportReference>>,
}

/// Intake record after sanitisation, ready for a bound insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SanitizedIntake {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub state: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub waist_circumference: Option<f64>,
    pub bp_systolic: Option<f64>,
    pub bp_diastolic: Option<f64>,
    pub ast: Option<f64>,
    pub alt: Option<f64>,
    pub ggt: Option<f64>,
    pub triglycerides: Option<f64>,
    pub hdl_cholesterol: Option<f64>,
    pub hba1c: Option<f64>,
    pub fasting_glucose: Option<f64>,
    pub fibroscan_kpa: Option<f64>,
    pub biopsy_result: Option<BiopsyStage>,
    pub diagnosis_group: Option<DiagnosisGroup>,
    pub report_files: Vec<ReportReference>,
}

/// One entry of the `uploadedFiles` response array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_url: String,
    pub file_type: ReportType,
}

impl From<UploadedFile> for ReportReference {
    fn from(file: UploadedFile) -> Self {
        ReportReference {
            url: file.file_url,
            report_type: file.file_type,
        }
    }
}
