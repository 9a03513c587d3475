// Intake form state: raw input strings, attachments, client-side validation,
// and the age derived from date of birth.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::models::{
    BiopsyStage, DiagnosisGroup, IntakePayload, RawValue, ReportReference, ReportType, Sex,
};
use crate::sanitize::{is_numeric_field, sanitize_field};

static MOBILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{10}$").unwrap());

/// Editable form inputs. Age is derived and not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Mobile,
    DateOfBirth,
    Sex,
    State,
    HeightCm,
    WeightKg,
    WaistCircumference,
    BpSystolic,
    BpDiastolic,
    Ast,
    Alt,
    Ggt,
    Triglycerides,
    HdlCholesterol,
    Hba1c,
    FastingGlucose,
    FibroscanKpa,
    BiopsyResult,
    DiagnosisGroup,
}

impl FormField {
    pub const ALL: &'static [FormField] = &[
        FormField::Name,
        FormField::Mobile,
        FormField::DateOfBirth,
        FormField::Sex,
        FormField::State,
        FormField::HeightCm,
        FormField::WeightKg,
        FormField::WaistCircumference,
        FormField::BpSystolic,
        FormField::BpDiastolic,
        FormField::Ast,
        FormField::Alt,
        FormField::Ggt,
        FormField::Triglycerides,
        FormField::HdlCholesterol,
        FormField::Hba1c,
        FormField::FastingGlucose,
        FormField::FibroscanKpa,
        FormField::BiopsyResult,
        FormField::DiagnosisGroup,
    ];

    /// Wire name of the field in the submit payload.
    pub fn as_str(self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Mobile => "mobile",
            FormField::DateOfBirth => "date_of_birth",
            FormField::Sex => "sex",
            FormField::State => "state",
            FormField::HeightCm => "height_cm",
            FormField::WeightKg => "weight_kg",
            FormField::WaistCircumference => "waist_circumference",
            FormField::BpSystolic => "bp_systolic",
            FormField::BpDiastolic => "bp_diastolic",
            FormField::Ast => "ast",
            FormField::Alt => "alt",
            FormField::Ggt => "ggt",
            FormField::Triglycerides => "triglycerides",
            FormField::HdlCholesterol => "hdl_cholesterol",
            FormField::Hba1c => "hba1c",
            FormField::FastingGlucose => "fasting_glucose",
            FormField::FibroscanKpa => "fibroscan_kpa",
            FormField::BiopsyResult => "biopsy_result",
            FormField::DiagnosisGroup => "diagnosis_group",
        }
    }
}

/// Inputs that must be filled before anything is sent.
pub const REQUIRED_FIELDS: &[FormField] = &[
    FormField::Name,
    FormField::Mobile,
    FormField::DateOfBirth,
    FormField::Sex,
    FormField::HeightCm,
    FormField::WeightKg,
    FormField::WaistCircumference,
];

/// A report file picked by the user, with its type label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Report type label; must be chosen before submitting.
    pub report_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found by [`IntakeForm::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_messages(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn join_messages(errors: &[FieldError]) -> String {
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    messages.join("; ")
}

impl ValidationErrors {
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakeForm {
    pub name: String,
    pub mobile: String,
    pub date_of_birth: String,
    /// Derived from `date_of_birth`; empty when it cannot be computed.
    pub age: String,
    pub sex: String,
    pub state: String,
    pub height_cm: String,
    pub weight_kg: String,
    pub waist_circumference: String,
    pub bp_systolic: String,
    pub bp_diastolic: String,
    pub ast: String,
    pub alt: String,
    pub ggt: String,
    pub triglycerides: String,
    pub hdl_cholesterol: String,
    pub hba1c: String,
    pub fasting_glucose: String,
    pub fibroscan_kpa: String,
    pub biopsy_result: String,
    pub diagnosis_group: String,
    pub attachments: Vec<Attachment>,
}

/// Whole years between `date_of_birth` and `today`, counting a year only
/// once the birthday has passed. `None` for a birth date after `today`.
pub fn derive_age(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if date_of_birth > today {
        return None;
    }
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Error for a filled-in choice input holding a value outside its options.
fn check_choice<T: FromStr>(field: FormField, value: &str) -> Option<FieldError> {
    let value = value.trim();
    if value.is_empty() || value.parse::<T>().is_ok() {
        return None;
    }
    Some(FieldError {
        field: field.as_str(),
        message: format!("{} has an unrecognised value {value:?}", field.as_str()),
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

impl IntakeForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update one input. Changing the date of birth recomputes age.
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        self.set_on(field, value, Local::now().date_naive());
    }

    /// [`IntakeForm::set`] with an explicit current date.
    pub fn set_on(&mut self, field: FormField, value: impl Into<String>, today: NaiveDate) {
        let value = value.into();
        if field == FormField::DateOfBirth {
            self.age = parse_date(&value)
                .and_then(|dob| derive_age(dob, today))
                .map(|age| age.to_string())
                .unwrap_or_default();
        }
        *self.slot(field) = value;
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Mobile => &self.mobile,
            FormField::DateOfBirth => &self.date_of_birth,
            FormField::Sex => &self.sex,
            FormField::State => &self.state,
            FormField::HeightCm => &self.height_cm,
            FormField::WeightKg => &self.weight_kg,
            FormField::WaistCircumference => &self.waist_circumference,
            FormField::BpSystolic => &self.bp_systolic,
            FormField::BpDiastolic => &self.bp_diastolic,
            FormField::Ast => &self.ast,
            FormField::Alt => &self.alt,
            FormField::Ggt => &self.ggt,
            FormField::Triglycerides => &self.triglycerides,
            FormField::HdlCholesterol => &self.hdl_cholesterol,
            FormField::Hba1c => &self.hba1c,
            FormField::FastingGlucose => &self.fasting_glucose,
            FormField::FibroscanKpa => &self.fibroscan_kpa,
            FormField::BiopsyResult => &self.biopsy_result,
            FormField::DiagnosisGroup => &self.diagnosis_group,
        }
    }

    fn slot(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Name => &mut self.name,
            FormField::Mobile => &mut self.mobile,
            FormField::DateOfBirth => &mut self.date_of_birth,
            FormField::Sex => &mut self.sex,
            FormField::State => &mut self.state,
            FormField::HeightCm => &mut self.height_cm,
            FormField::WeightKg => &mut self.weight_kg,
            FormField::WaistCircumference => &mut self.waist_circumference,
            FormField::BpSystolic => &mut self.bp_systolic,
            FormField::BpDiastolic => &mut self.bp_diastolic,
            FormField::Ast => &mut self.ast,
            FormField::Alt => &mut self.alt,
            FormField::Ggt => &mut self.ggt,
            FormField::Triglycerides => &mut self.triglycerides,
            FormField::HdlCholesterol => &mut self.hdl_cholesterol,
            FormField::Hba1c => &mut self.hba1c,
            FormField::FastingGlucose => &mut self.fasting_glucose,
            FormField::FibroscanKpa => &mut self.fibroscan_kpa,
            FormField::BiopsyResult => &mut self.biopsy_result,
            FormField::DiagnosisGroup => &mut self.diagnosis_group,
        }
    }

    /// Add a report file. Its type label may be set now or later.
    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Set the type label of attachment `index`. Returns false if out of range.
    pub fn label_attachment(&mut self, index: usize, report_type: impl Into<String>) -> bool {
        match self.attachments.get_mut(index) {
            Some(attachment) => {
                attachment.report_type = report_type.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    /// Client-side checks, run before any request is made.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        for field in REQUIRED_FIELDS {
            if self.get(*field).trim().is_empty() {
                errors.push(FieldError {
                    field: field.as_str(),
                    message: format!("{} is required", field.as_str()),
                });
            }
        }

        // Numeric inputs follow the server parse rule
        for field in FormField::ALL {
            let name = field.as_str();
            if !is_numeric_field(name) {
                continue;
            }
            if let Err(e) = sanitize_field(name, Some(&RawValue::Text(self.get(*field).to_string())))
            {
                errors.push(FieldError {
                    field: name,
                    message: e.to_string(),
                });
            }
        }
        if let Err(e) = sanitize_field("age", Some(&RawValue::Text(self.age.clone()))) {
            errors.push(FieldError {
                field: "age",
                message: e.to_string(),
            });
        }

        errors.extend(check_choice::<Sex>(FormField::Sex, &self.sex));
        errors.extend(check_choice::<BiopsyStage>(FormField::BiopsyResult, &self.biopsy_result));
        errors.extend(check_choice::<DiagnosisGroup>(
            FormField::DiagnosisGroup,
            &self.diagnosis_group,
        ));

        let mobile = self.mobile.trim();
        if !mobile.is_empty() && !MOBILE_PATTERN.is_match(mobile) {
            errors.push(FieldError {
                field: FormField::Mobile.as_str(),
                message: "Mobile number must be exactly 10 digits".into(),
            });
        }

        if !self.date_of_birth.trim().is_empty() {
            match parse_date(&self.date_of_birth) {
                None => errors.push(FieldError {
                    field: FormField::DateOfBirth.as_str(),
                    message: "Date of birth must be a valid date".into(),
                }),
                Some(dob) if dob > today => errors.push(FieldError {
                    field: FormField::DateOfBirth.as_str(),
                    message: "Date of birth cannot be in the future".into(),
                }),
                Some(_) => {}
            }
        }

        for (index, attachment) in self.attachments.iter().enumerate() {
            let label = attachment.report_type.trim();
            if label.is_empty() {
                errors.push(FieldError {
                    field: "report_files",
                    message: format!("Select a report type for {}", attachment.file_name),
                });
                tracing::debug!(index, "Attachment without report type");
            } else if label.parse::<ReportType>().is_err() {
                errors.push(FieldError {
                    field: "report_files",
                    message: format!("Unknown report type {label:?} for {}", attachment.file_name),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Submit body for this form with the given uploaded report references.
    pub fn to_payload(&self, report_files: Vec<ReportReference>) -> IntakePayload {
        let raw = |s: &str| Some(RawValue::Text(s.to_string()));
        IntakePayload {
            name: raw(&self.name),
            mobile: raw(&self.mobile),
            date_of_birth: raw(&self.date_of_birth),
            age: raw(&self.age),
            sex: raw(&self.sex),
            state: raw(&self.state),
            height_cm: raw(&self.height_cm),
            weight_kg: raw(&self.weight_kg),
            waist_circumference: raw(&self.waist_circumference),
            bp_systolic: raw(&self.bp_systolic),
            bp_diastolic: raw(&self.bp_diastolic),
            ast: raw(&self.ast),
            alt: raw(&self.alt),
            ggt: raw(&self.ggt),
            triglycerides: raw(&self.triglycerides),
            hdl_cholesterol: raw(&self.hdl_cholesterol),
            hba1c: raw(&self.hba1c),
            fasting_glucose: raw(&self.fasting_glucose),
            fibroscan_kpa: raw(&self.fibroscan_kpa),
            biopsy_result: raw(&self.biopsy_result),
            diagnosis_group: raw(&self.diagnosis_group),
            report_files: Some(report_files),
        }
    }
}
