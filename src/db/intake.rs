use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::SanitizedIntake;
use crate::sanitize::{decode_report_files, encode_report_files};

/// Identity assigned to a freshly inserted intake row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertedRecord {
    pub id: Uuid,
    pub created_at: String,
}

/// A persisted intake row, as read back for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredIntake {
    pub id: Uuid,
    pub created_at: String,
    pub intake: SanitizedIntake,
}

/// Insert a new intake record. All values are bound parameters.
pub fn insert_intake(
    conn: &Connection,
    intake: &SanitizedIntake,
) -> Result<InsertedRecord, DatabaseError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let report_files = encode_report_files(&intake.report_files)?;

    conn.execute(
        "INSERT INTO patients (
            id, name, mobile, date_of_birth, age, sex, state,
            height_cm, weight_kg, waist_circumference,
            bp_systolic, bp_diastolic, ast, alt, ggt,
            triglycerides, hdl_cholesterol, hba1c, fasting_glucose,
            fibroscan_kpa, biopsy_result, diagnosis_group,
            report_files, created_at
         ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19,
            ?20, ?21, ?22,
            ?23, ?24
         )",
        params![
            id.to_string(),
            intake.name,
            intake.mobile,
            intake.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            intake.age,
            intake.sex.map(|s| s.as_str()),
            intake.state,
            intake.height_cm,
            intake.weight_kg,
            intake.waist_circumference,
            intake.bp_systolic,
            intake.bp_diastolic,
            intake.ast,
            intake.alt,
            intake.ggt,
            intake.triglycerides,
            intake.hdl_cholesterol,
            intake.hba1c,
            intake.fasting_glucose,
            intake.fibroscan_kpa,
            intake.biopsy_result.map(|b| b.as_str()),
            intake.diagnosis_group.map(|g| g.as_str()),
            report_files,
            created_at,
        ],
    )?;

    Ok(InsertedRecord { id, created_at })
}

/// Read one intake row by ID.
pub fn get_intake(conn: &Connection, id: &Uuid) -> Result<StoredIntake, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, mobile, date_of_birth, age, sex, state,
                height_cm, weight_kg, waist_circumference,
                bp_systolic, bp_diastolic, ast, alt, ggt,
                triglycerides, hdl_cholesterol, hba1c, fasting_glucose,
                fibroscan_kpa, biopsy_result, diagnosis_group,
                report_files, created_at
         FROM patients WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id.to_string()], row_to_intake)?;
    match rows.next() {
        Some(row) => Ok(row?),
        None => Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: id.to_string(),
        }),
    }
}

/// Number of stored intake rows.
pub fn count_intakes(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    Ok(count)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> Result<Option<T>, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn row_to_intake(row: &rusqlite::Row) -> Result<StoredIntake, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let dob_str: Option<String> = row.get(3)?;
    let files_str: String = row.get(22)?;

    Ok(StoredIntake {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
        created_at: row.get(23)?,
        intake: SanitizedIntake {
            name: row.get(1)?,
            mobile: row.get(2)?,
            date_of_birth: dob_str
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .map_err(|e| conversion_error(3, e))?,
            age: row.get(4)?,
            sex: parse_column(row, 5)?,
            state: row.get(6)?,
            height_cm: row.get(7)?,
            weight_kg: row.get(8)?,
            waist_circumference: row.get(9)?,
            bp_systolic: row.get(10)?,
            bp_diastolic: row.get(11)?,
            ast: row.get(12)?,
            alt: row.get(13)?,
            ggt: row.get(14)?,
            triglycerides: row.get(15)?,
            hdl_cholesterol: row.get(16)?,
            hba1c: row.get(17)?,
            fasting_glucose: row.get(18)?,
            fibroscan_kpa: row.get(19)?,
            biopsy_result: parse_column(row, 20)?,
            diagnosis_group: parse_column(row, 21)?,
            report_files: decode_report_files(&files_str).map_err(|e| conversion_error(22, e))?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::{DiagnosisGroup, ReportReference, ReportType, Sex};

    fn sample_intake() -> SanitizedIntake {
        SanitizedIntake {
            name: Some("Asha Menon".into()),
            mobile: Some("9876543210".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1979, 6, 15),
            age: Some(45.0),
            sex: Some(Sex::Female),
            state: Some("Kerala".into()),
            height_cm: Some(160.0),
            weight_kg: Some(65.0),
            waist_circumference: Some(80.0),
            diagnosis_group: Some(DiagnosisGroup::Mafl),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_read_back() {
        let conn = open_memory_database().unwrap();
        let intake = sample_intake();
        let record = insert_intake(&conn, &intake).unwrap();

        let stored = get_intake(&conn, &record.id).unwrap();
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.intake, intake);
        assert_eq!(count_intakes(&conn).unwrap(), 1);
    }

    #[test]
    fn empty_labs_are_stored_as_null() {
        let conn = open_memory_database().unwrap();
        let record = insert_intake(&conn, &sample_intake()).unwrap();

        let (ast, hba1c, age): (Option<f64>, Option<f64>, Option<f64>) = conn
            .query_row(
                "SELECT ast, hba1c, age FROM patients WHERE id = ?1",
                params![record.id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(ast, None);
        assert_eq!(hba1c, None);
        assert_eq!(age, Some(45.0));
    }

    #[test]
    fn empty_report_files_stored_as_json_array() {
        let conn = open_memory_database().unwrap();
        let record = insert_intake(&conn, &sample_intake()).unwrap();

        let (raw, kind): (String, String) = conn
            .query_row(
                "SELECT report_files, json_type(report_files) FROM patients WHERE id = ?1",
                params![record.id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(raw, "[]");
        assert_eq!(kind, "array");
    }

    #[test]
    fn report_files_preserve_order() {
        let conn = open_memory_database().unwrap();
        let mut intake = sample_intake();
        intake.report_files = vec![
            ReportReference {
                url: "http://localhost/files/reports/1-a.pdf".into(),
                report_type: ReportType::BloodReport,
            },
            ReportReference {
                url: "http://localhost/files/reports/2-b.png".into(),
                report_type: ReportType::Ultrasound,
            },
        ];
        let record = insert_intake(&conn, &intake).unwrap();

        let stored = get_intake(&conn, &record.id).unwrap();
        assert_eq!(stored.intake.report_files, intake.report_files);

        let first_type: String = conn
            .query_row(
                "SELECT json_extract(report_files, '$[0].type') FROM patients WHERE id = ?1",
                params![record.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(first_type, "Blood Report");
    }

    #[test]
    fn hostile_text_is_bound_not_interpolated() {
        let conn = open_memory_database().unwrap();
        let mut intake = sample_intake();
        intake.name = Some("Robert'); DROP TABLE patients;--".into());
        let record = insert_intake(&conn, &intake).unwrap();

        let stored = get_intake(&conn, &record.id).unwrap();
        assert_eq!(stored.intake.name, intake.name);
        assert_eq!(count_intakes(&conn).unwrap(), 1);
    }

    #[test]
    fn each_insert_creates_a_new_row() {
        let conn = open_memory_database().unwrap();
        let a = insert_intake(&conn, &sample_intake()).unwrap();
        let b = insert_intake(&conn, &sample_intake()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(count_intakes(&conn).unwrap(), 2);
    }

    #[test]
    fn missing_row_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_intake(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
