//! Identity verification intake: a five-step wizard (personal data, address, identity
//! document, selfie, review) with per-step validation, document and selfie capture, and a
//! submission hand-off to an external gateway.
//!
//! [`KycWizard`] holds the state of one applicant's form and has no I/O of its own.
//! [`KycIntakeService`] keeps wizards per session for the HTTP adapter in [`router`].

pub mod domain;
pub mod gateway;
pub mod router;
pub mod schema;
pub mod sequencer;
pub mod service;
pub mod uploads;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    Attachment, AttachmentSlot, DocumentType, Field, KycStep, SelectOption, StepDescriptor,
    UnknownField, COUNTRY_OPTIONS, DOCUMENT_TYPE_OPTIONS,
};
pub use gateway::{Notifier, SubmissionError, SubmissionGateway, SubmissionReceipt};
pub use router::kyc_router;
pub use schema::{FieldErrors, FormValues, KycSubmission, StepValues, ValidationContext};
pub use sequencer::{SequencerOptions, StepSequencer};
pub use service::{KycIntakeService, ServiceError, SessionId, SessionSnapshot};
pub use uploads::{FileConstraints, FileEvent, FileRejection, FileSlot, SlotStatus, UploadOptions};
pub use wizard::{
    KycWizard, ReviewSummary, StepOutcome, SubmissionStart, SubmitOutcome, WizardError,
    WizardPhase, WizardView, SUBMISSION_FAILURE_MESSAGE, SUBMISSION_SUCCESS_MESSAGE,
};
