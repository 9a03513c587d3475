//! Client side of intake: form state, validation and the submit sequence.

pub mod form;
pub mod session;
pub mod transport;

pub use form::{derive_age, Attachment, FormField, IntakeForm, ValidationErrors};
pub use session::{FormPhase, IntakeSession, SubmitOutcome};
pub use transport::{HttpTransport, IntakeTransport, TransportError};
