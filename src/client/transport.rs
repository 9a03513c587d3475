//! Network side of the intake form: the two calls a submission makes.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::api::error::ErrorBody;
use crate::api::types::UploadResponse;
use crate::client::form::Attachment;
use crate::models::{IntakePayload, UploadedFile};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Could not encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Calls the form needs from the intake service.
#[async_trait]
pub trait IntakeTransport: Send + Sync {
    /// Upload every attachment in one batch. Results follow input order.
    async fn upload_reports(
        &self,
        attachments: &[Attachment],
    ) -> Result<Vec<UploadedFile>, TransportError>;

    /// Send the intake record. Returns the server's confirmation message.
    async fn submit_record(&self, payload: &IntakePayload) -> Result<String, TransportError>;
}

/// [`IntakeTransport`] over HTTP against a running intake server.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn build_form(attachments: &[Attachment]) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for attachment in attachments {
        let mut part = Part::bytes(attachment.bytes.clone()).file_name(attachment.file_name.clone());
        if let Some(content_type) = &attachment.content_type {
            part = part.mime_str(content_type)?;
        }
        form = form.part("reports", part);
    }
    let labels: Vec<&str> = attachment_labels(attachments);
    Ok(form.text("types", serde_json::to_string(&labels)?))
}

fn attachment_labels(attachments: &[Attachment]) -> Vec<&str> {
    attachments.iter().map(|a| a.report_type.as_str()).collect()
}

#[async_trait]
impl IntakeTransport for HttpTransport {
    async fn upload_reports(
        &self,
        attachments: &[Attachment],
    ) -> Result<Vec<UploadedFile>, TransportError> {
        let form = build_form(attachments)?;
        let response = self
            .client
            .post(self.endpoint("/upload-multiple"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::UnexpectedResponse(e.to_string()))?;
        if parsed.uploaded_files.len() != attachments.len() {
            return Err(TransportError::UnexpectedResponse(format!(
                "sent {} file(s), server returned {}",
                attachments.len(),
                parsed.uploaded_files.len()
            )));
        }
        Ok(parsed.uploaded_files)
    }

    async fn submit_record(&self, payload: &IntakePayload) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.endpoint("/submit"))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let message = response.text().await?;
        if status.is_success() {
            Ok(message)
        } else {
            Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
