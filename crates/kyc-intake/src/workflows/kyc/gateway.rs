use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::KycSubmission;

/// Acknowledgement returned once the finalized record has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub reference: String,
    pub received_at: DateTime<Utc>,
}

/// Submission failure; the wizard keeps every entered value so the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission transport unavailable: {0}")]
    Transport(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Outbound hook receiving the validated record and its attachments.
pub trait SubmissionGateway: Send + Sync {
    fn submit(
        &self,
        payload: KycSubmission,
    ) -> impl Future<Output = Result<SubmissionReceipt, SubmissionError>> + Send;
}

/// Outcome messages for the user; display is up to the host.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}
