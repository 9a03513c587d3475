//! Submission flow for one intake form.
//!
//! A submit runs validate, then upload (only when files are attached), then
//! record submit. Any failure leaves the form as it was and returns it to
//! editing. A submit started while another is in flight is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate};

use crate::client::form::{Attachment, FormField, IntakeForm, ValidationErrors};
use crate::client::transport::{IntakeTransport, TransportError};
use crate::models::ReportReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    Validating,
    Uploading,
    Submitting,
    /// Last submission succeeded and the form was cleared.
    Idle,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted { message: String },
    Invalid(ValidationErrors),
    Failed(TransportError),
    AlreadySubmitting,
}

pub struct IntakeSession<T> {
    transport: T,
    form: Mutex<IntakeForm>,
    phase: Mutex<FormPhase>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the submit future ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: IntakeTransport> IntakeSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            form: Mutex::new(IntakeForm::new()),
            phase: Mutex::new(FormPhase::Editing),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn phase(&self) -> FormPhase {
        *lock(&self.phase)
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Copy of the current form state.
    pub fn form(&self) -> IntakeForm {
        lock(&self.form).clone()
    }

    pub fn set_field(&self, field: FormField, value: impl Into<String>) {
        self.edit(|form| form.set(field, value));
    }

    pub fn attach(&self, attachment: Attachment) {
        self.edit(|form| form.attach(attachment));
    }

    /// Apply an arbitrary change to the form.
    pub fn edit<R>(&self, f: impl FnOnce(&mut IntakeForm) -> R) -> R {
        let result = f(&mut lock(&self.form));
        if !self.is_submitting() {
            self.set_phase(FormPhase::Editing);
        }
        result
    }

    fn set_phase(&self, phase: FormPhase) {
        *lock(&self.phase) = phase;
    }

    pub async fn submit(&self) -> SubmitOutcome {
        self.submit_on(Local::now().date_naive()).await
    }

    /// [`IntakeSession::submit`] with an explicit current date.
    pub async fn submit_on(&self, today: NaiveDate) -> SubmitOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Submit ignored, one already in flight");
            return SubmitOutcome::AlreadySubmitting;
        }
        let _in_flight = InFlight(&self.in_flight);

        let outcome = self.run_submission(today).await;
        let phase = match outcome {
            SubmitOutcome::Submitted { .. } => FormPhase::Idle,
            _ => FormPhase::Editing,
        };
        self.set_phase(phase);
        outcome
    }

    async fn run_submission(&self, today: NaiveDate) -> SubmitOutcome {
        self.set_phase(FormPhase::Validating);
        let snapshot = self.form();
        if let Err(errors) = snapshot.validate(today) {
            tracing::debug!(count = errors.0.len(), "Form failed validation");
            return SubmitOutcome::Invalid(errors);
        }

        let mut references: Vec<ReportReference> = Vec::new();
        if !snapshot.attachments.is_empty() {
            self.set_phase(FormPhase::Uploading);
            match self.transport.upload_reports(&snapshot.attachments).await {
                Ok(uploaded) => references.extend(uploaded.into_iter().map(Into::into)),
                Err(e) => {
                    tracing::warn!(error = %e, "Report upload failed");
                    return SubmitOutcome::Failed(e);
                }
            }
        }

        self.set_phase(FormPhase::Submitting);
        let payload = snapshot.to_payload(references);
        match self.transport.submit_record(&payload).await {
            Ok(message) => {
                *lock(&self.form) = IntakeForm::new();
                tracing::info!(files = snapshot.attachments.len(), "Intake submitted");
                SubmitOutcome::Submitted { message }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Intake submit failed");
                SubmitOutcome::Failed(e)
            }
        }
    }
}
