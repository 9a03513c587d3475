//! Intake API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//!
//! Layers (outermost → innermost):
//! 1. Trace → 2. CORS → 3. Body limit

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::config::IntakeConfig;

/// Build the intake API router.
pub fn intake_router(ctx: ApiContext, config: &IntakeConfig) -> Router {
    Router::new()
        .route("/submit", post(endpoints::submit::submit))
        .route("/upload-multiple", post(endpoints::upload::upload_multiple))
        .route("/health", get(endpoints::health::check))
        .route("/files/*key", get(endpoints::files::fetch))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(config.allowed_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the intake form. A single configured origin, or any origin
/// when none is configured.
pub fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let origin = match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring unparseable allowed origin; allowing any");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::{count_intakes, get_intake, RecordStore};
    use crate::models::ReportType;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::{FilesystemBackend, StorageBackend};

    const BOUNDARY: &str = "intake-test-boundary";

    fn test_config() -> IntakeConfig {
        IntakeConfig::from_lookup(|_| None).unwrap()
    }

    fn test_context() -> (ApiContext, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::open_in_memory().unwrap();
        (ApiContext::new(store, backend.clone()), backend)
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    fn submit_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/submit")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    enum Part<'a> {
        File(&'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_request(parts: &[Part]) -> Request<Body> {
        let mut body: Vec<u8> = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(field, name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text(field, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload-multiple")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn submit_end_to_end_stores_nulls_and_numbers() {
        let (ctx, _) = test_context();
        let store = ctx.store.clone();
        let app = intake_router(ctx, &test_config());

        let payload = json!({
            "name": "Asha Menon",
            "mobile": "9876543210",
            "date_of_birth": "1979-06-15",
            "age": "45",
            "sex": "Female",
            "state": "Kerala",
            "height_cm": "160",
            "weight_kg": "65",
            "waist_circumference": "80",
            "bp_systolic": "",
            "bp_diastolic": "",
            "ast": "",
            "alt": "",
            "ggt": "",
            "triglycerides": "",
            "hdl_cholesterol": "",
            "hba1c": "",
            "fasting_glucose": "",
            "fibroscan_kpa": "",
            "biopsy_result": "",
            "diagnosis_group": "",
            "report_files": []
        });

        let response = app
            .oneshot(submit_request(&payload.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"Data stored successfully.");

        let row: (Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>, String) = store
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT age, height_cm, weight_kg, waist_circumference, ast, hba1c, report_files FROM patients",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(row.0, Some(45.0));
        assert_eq!(row.1, Some(160.0));
        assert_eq!(row.2, Some(65.0));
        assert_eq!(row.3, Some(80.0));
        assert_eq!(row.4, None);
        assert_eq!(row.5, None);
        assert_eq!(row.6, "[]");
    }

    #[tokio::test]
    async fn submit_rejects_non_numeric_lab_value() {
        let (ctx, _) = test_context();
        let store = ctx.store.clone();
        let app = intake_router(ctx, &test_config());

        let response = app
            .oneshot(submit_request(r#"{"age":"45","ast":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(text.contains("ast"), "{text}");

        assert_eq!(store.with_connection(count_intakes).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_unknown_field() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let response = app
            .oneshot(submit_request(r#"{"age":"45","blood_group":"O+"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_rejects_malformed_json() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let response = app.oneshot(submit_request("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_over_body_limit_is_413() {
        let (ctx, _) = test_context();
        let mut config = test_config();
        config.max_body_bytes = 64;
        let app = intake_router(ctx, &config);

        let body = json!({ "name": "x".repeat(200) }).to_string();
        let response = app.oneshot(submit_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn submit_store_failure_returns_generic_500() {
        let (ctx, _) = test_context();
        ctx.store
            .with_connection(|conn| Ok(conn.execute_batch("DROP TABLE patients")?))
            .await
            .unwrap();
        let app = intake_router(ctx, &test_config());

        let response = app.oneshot(submit_request(r#"{"age":"45"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_bytes(response).await, b"Server error.");
    }

    #[tokio::test]
    async fn submit_keeps_report_references() {
        let (ctx, _) = test_context();
        let store = ctx.store.clone();
        let app = intake_router(ctx, &test_config());

        let payload = json!({
            "age": "51",
            "report_files": [
                {"url": "http://localhost:5050/files/reports/1-a-blood.pdf", "type": "Blood Report"},
                {"url": "http://localhost:5050/files/reports/2-b-scan.png", "type": "Fibroscan"}
            ]
        });
        let response = app
            .oneshot(submit_request(&payload.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = store
            .with_connection(|conn| {
                let id: String = conn.query_row("SELECT id FROM patients", [], |r| r.get(0))?;
                get_intake(conn, &uuid::Uuid::parse_str(&id).unwrap())
            })
            .await
            .unwrap();
        assert_eq!(stored.intake.report_files.len(), 2);
        assert_eq!(stored.intake.report_files[1].report_type, ReportType::Fibroscan);
    }

    #[tokio::test]
    async fn upload_two_files_preserves_order() {
        let (ctx, backend) = test_context();
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "blood.pdf", b"%PDF-1.4 blood"),
            Part::File("reports", "ultrasound.pdf", b"%PDF-1.4 us"),
            Part::Text("types", r#"["Blood Report","Ultrasound"]"#),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        let files = json["uploadedFiles"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["file_type"], "Blood Report");
        assert_eq!(files[1]["file_type"], "Ultrasound");
        assert!(files[0]["file_url"].as_str().unwrap().ends_with("-blood.pdf"));
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn upload_count_mismatch_is_400_and_stores_nothing() {
        let (ctx, backend) = test_context();
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "a.pdf", b"a"),
            Part::File("reports", "b.pdf", b"b"),
            Part::File("reports", "c.pdf", b"c"),
            Part::Text("types", r#"["Blood Report","Ultrasound"]"#),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("3 file(s)"));
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn upload_without_types_is_400() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[Part::File("reports", "a.pdf", b"a")]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["error"], "Missing file types");
    }

    #[tokio::test]
    async fn upload_with_malformed_types_is_400() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "a.pdf", b"a"),
            Part::Text("types", "Blood Report"),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_without_files_is_400() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[Part::Text("types", "[]")]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["error"], "No files uploaded");
    }

    #[tokio::test]
    async fn upload_storage_failure_is_500_and_rolled_back() {
        let backend = Arc::new(MemoryBackend::failing_on("broken"));
        let ctx = ApiContext::new(RecordStore::open_in_memory().unwrap(), backend.clone());
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "fine.pdf", b"a"),
            Part::File("reports", "broken.pdf", b"b"),
            Part::Text("types", r#"["Biopsy","Other"]"#),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["error"], "Server error.");
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn upload_oversized_file_is_413() {
        let (ctx, backend) = test_context();
        let ctx = ApiContext {
            uploader: ctx.uploader.with_max_file_bytes(8),
            ..ctx
        };
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "big.pdf", b"0123456789"),
            Part::Text("types", r#"["Other"]"#),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn uploaded_file_is_served_back() {
        let tmp = tempfile::tempdir().unwrap();
        let backend: Arc<dyn StorageBackend> =
            Arc::new(FilesystemBackend::new(tmp.path(), "http://localhost:5050/files"));
        let ctx = ApiContext::new(RecordStore::open_in_memory().unwrap(), backend);
        let app = intake_router(ctx, &test_config());

        let request = multipart_request(&[
            Part::File("reports", "blood.pdf", b"%PDF-1.4 body"),
            Part::Text("types", r#"["Blood Report"]"#),
        ]);
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        let url = json["uploadedFiles"][0]["file_url"].as_str().unwrap().to_string();
        let path = url.strip_prefix("http://localhost:5050").unwrap();

        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/pdf"
        );
        assert_eq!(body_bytes(response).await, b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/reports/nothing-here.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let (ctx, _) = test_context();
        let config = IntakeConfig {
            allowed_origin: Some("https://intake.example.org".into()),
            ..test_config()
        };
        let app = intake_router(ctx, &config);

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/submit")
                    .header("Origin", "https://intake.example.org")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://intake.example.org"
        );
    }

    #[tokio::test]
    async fn not_found_for_unknown_route() {
        let (ctx, _) = test_context();
        let app = intake_router(ctx, &test_config());

        let response = app
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
