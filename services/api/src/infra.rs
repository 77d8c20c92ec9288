use chrono::{NaiveDate, Utc};
use kyc_intake::workflows::kyc::{
    KycSubmission, Notifier, SubmissionError, SubmissionGateway, SubmissionReceipt,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Acknowledges every submission until a real KYC provider is wired in. Payloads are
/// dropped once acknowledged; only the receipt count is kept.
#[derive(Default, Clone)]
pub(crate) struct RecordingSubmissionGateway {
    issued: Arc<AtomicU64>,
}

impl RecordingSubmissionGateway {
    pub(crate) fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl SubmissionGateway for RecordingSubmissionGateway {
    async fn submit(&self, payload: KycSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("kyc-ref-{sequence:04}");
        info!(
            %reference,
            attachments = payload.attachments().count(),
            "kyc submission acknowledged"
        );
        Ok(SubmissionReceipt {
            reference,
            received_at: Utc::now(),
        })
    }
}

/// Routes wizard toasts into the service log.
#[derive(Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        info!(toast = message, "submission succeeded");
    }

    fn notify_failure(&self, message: &str) {
        warn!(toast = message, "submission failed");
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
