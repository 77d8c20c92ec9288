use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use image::RgbImage;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::IntakeConfig;
use crate::workflows::kyc::gateway::{
    Notifier, SubmissionError, SubmissionGateway, SubmissionReceipt,
};
use crate::workflows::kyc::schema::KycSubmission;
use crate::workflows::kyc::uploads::{CameraConstraints, MediaDevices, MediaError, VideoStream};
use crate::workflows::kyc::{
    kyc_router, Attachment, AttachmentSlot, Field, KycIntakeService, KycStep, KycWizard,
    StepOutcome,
};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn captured_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).expect("valid timestamp")
}

pub(super) fn personal_fields() -> Vec<(Field, &'static str)> {
    vec![
        (Field::FullName, "João da Silva"),
        (Field::Email, "joao@example.com"),
        (Field::Phone, "11987654321"),
        (Field::Cpf, "529.982.247-25"),
        (Field::BirthDate, "1990-01-01"),
    ]
}

pub(super) fn address_fields() -> Vec<(Field, &'static str)> {
    vec![
        (Field::Country, "br"),
        (Field::ZipCode, "01310-100"),
        (Field::State, "SP"),
        (Field::City, "São Paulo"),
        (Field::Street, "Avenida Paulista"),
        (Field::Number, "1000"),
    ]
}

pub(super) fn document_fields() -> Vec<(Field, &'static str)> {
    vec![
        (Field::DocumentType, "rg"),
        (Field::DocumentNumber, "12.345.678-9"),
        (Field::IssuingCountry, "br"),
    ]
}

pub(super) fn scan(name: &str, mime_type: &str, size: usize) -> Attachment {
    Attachment::new(name, mime_type, vec![0x25u8; size])
}

pub(super) fn wizard() -> KycWizard {
    KycWizard::new(&IntakeConfig::default()).with_today(today())
}

pub(super) fn fill(wizard: &mut KycWizard, fields: &[(Field, &str)]) {
    for (field, value) in fields {
        wizard
            .on_field_change(*field, *value)
            .expect("field belongs to the active step");
    }
}

fn fill_current(wizard: &mut KycWizard) {
    match wizard.current_step() {
        KycStep::Personal => fill(wizard, &personal_fields()),
        KycStep::Address => fill(wizard, &address_fields()),
        KycStep::Document => {
            fill(wizard, &document_fields());
            wizard
                .set_attachment(
                    AttachmentSlot::DocumentFront,
                    Some(scan("frente.pdf", "application/pdf", 4 * 1024)),
                )
                .expect("document step active");
            wizard
                .set_attachment(
                    AttachmentSlot::DocumentBack,
                    Some(scan("verso.png", "image/png", 4 * 1024)),
                )
                .expect("document step active");
        }
        KycStep::Selfie | KycStep::Review => {}
    }
}

/// Fills and commits every step before `target`.
pub(super) fn advance_to(wizard: &mut KycWizard, target: KycStep) {
    while wizard.current_step() < target {
        fill_current(wizard);
        let outcome = wizard.next().expect("wizard editable");
        assert!(
            matches!(outcome, StepOutcome::Advanced { .. }),
            "step {:?} should pass: {outcome:?}",
            wizard.current_step()
        );
    }
}

#[derive(Default)]
pub(super) struct RecordingGateway {
    pub(super) received: Mutex<Vec<KycSubmission>>,
    pub(super) failing: AtomicBool,
}

impl RecordingGateway {
    pub(super) fn failing() -> Self {
        let gateway = Self::default();
        gateway.failing.store(true, Ordering::SeqCst);
        gateway
    }

    pub(super) fn received(&self) -> Vec<KycSubmission> {
        self.received.lock().expect("gateway log").clone()
    }
}

impl SubmissionGateway for RecordingGateway {
    async fn submit(&self, payload: KycSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SubmissionError::Transport("connection reset".to_string()));
        }
        let mut received = self.received.lock().expect("gateway log");
        received.push(payload);
        Ok(SubmissionReceipt {
            reference: format!("sub-{:04}", received.len()),
            received_at: captured_at(),
        })
    }
}

/// Holds every submission until released, so a second submit can race the first.
#[derive(Default)]
pub(super) struct GatedGateway {
    pub(super) entered: Notify,
    pub(super) release: Notify,
}

impl SubmissionGateway for GatedGateway {
    async fn submit(&self, _payload: KycSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(SubmissionReceipt {
            reference: "sub-gated".to_string(),
            received_at: captured_at(),
        })
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    pub(super) successes: Mutex<Vec<String>>,
    pub(super) failures: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub(super) fn successes(&self) -> Vec<String> {
        self.successes.lock().expect("notifier log").clone()
    }

    pub(super) fn failures(&self) -> Vec<String> {
        self.failures.lock().expect("notifier log").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify_success(&self, message: &str) {
        self.successes
            .lock()
            .expect("notifier log")
            .push(message.to_string());
    }

    fn notify_failure(&self, message: &str) {
        self.failures
            .lock()
            .expect("notifier log")
            .push(message.to_string());
    }
}

pub(super) struct FakeStream {
    stopped: Arc<AtomicBool>,
}

impl VideoStream for FakeStream {
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError> {
        Ok(RgbImage::from_pixel(16, 12, image::Rgb([180, 140, 110])))
    }

    fn stop_tracks(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

pub(super) struct FakeCamera {
    pub(super) failure: Option<MediaError>,
    pub(super) stopped: Arc<AtomicBool>,
}

impl FakeCamera {
    pub(super) fn working() -> Self {
        Self {
            failure: None,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(super) fn failing(failure: MediaError) -> Self {
        Self {
            failure: Some(failure),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(super) fn released(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaDevices for FakeCamera {
    type Stream = FakeStream;

    async fn open_video(&self, _constraints: &CameraConstraints) -> Result<FakeStream, MediaError> {
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => {
                self.stopped.store(false, Ordering::SeqCst);
                Ok(FakeStream {
                    stopped: self.stopped.clone(),
                })
            }
        }
    }
}

pub(super) type TestService = KycIntakeService<RecordingGateway, MemoryNotifier>;

pub(super) fn build_service() -> (Arc<TestService>, Arc<RecordingGateway>, Arc<MemoryNotifier>) {
    build_service_with(RecordingGateway::default())
}

pub(super) fn build_service_with(
    gateway: RecordingGateway,
) -> (Arc<TestService>, Arc<RecordingGateway>, Arc<MemoryNotifier>) {
    let gateway = Arc::new(gateway);
    let notifier = Arc::new(MemoryNotifier::default());
    let service = KycIntakeService::new(gateway.clone(), notifier.clone(), IntakeConfig::default())
        .with_today(today());
    (Arc::new(service), gateway, notifier)
}

pub(super) fn router_with_service(service: Arc<TestService>) -> Router {
    kyc_router(service)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
