use serde::Serialize;

use super::super::domain::{Attachment, AttachmentSlot, DocumentType, KycStep, StepDescriptor};
use super::super::gateway::SubmissionReceipt;
use super::super::schema::{AddressDraft, FieldErrors, FormValues, PersonalDraft, StepValues};
use super::super::uploads::{FileSlot, InputProps, SlotStatus};

/// Coarse wizard state as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step_index", rename_all = "snake_case")]
pub enum WizardPhase {
    Editing(usize),
    Reviewing,
    Submitting,
    Completed,
}

/// Everything needed to render the active step.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub phase: WizardPhase,
    pub step: StepDescriptor,
    pub step_index: usize,
    pub total_steps: usize,
    pub progress: u8,
    pub is_first_step: bool,
    pub is_last_step: bool,
    pub values: StepValues,
    pub errors: FieldErrors,
    pub attachments: Vec<SlotView>,
    pub camera_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SubmissionReceipt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub slot: AttachmentSlot,
    pub label: &'static str,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub dragging: bool,
    pub input: InputProps,
}

impl SlotView {
    pub(crate) fn of(slot: AttachmentSlot, state: &FileSlot) -> Self {
        Self {
            slot,
            label: slot.label(),
            status: state.status(),
            file: state.file().cloned(),
            error: state.error().map(ToString::to_string),
            preview_url: state.preview_url().map(str::to_string),
            dragging: state.is_dragging(),
            input: state.input_props(),
        }
    }
}

/// One block of the review page with the step index used by its edit action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSection<T> {
    pub title: &'static str,
    pub edit_step: usize,
    pub values: T,
}

impl<T> ReviewSection<T> {
    fn new(step: KycStep, values: T) -> Self {
        Self {
            title: step.title(),
            edit_step: step.index(),
            values,
        }
    }
}

/// Document data with attachments reduced to presence flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReview {
    pub document_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type_label: Option<&'static str>,
    pub document_number: String,
    pub issuing_country: String,
    pub file_front: bool,
    pub file_back: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfieReview {
    pub has_selfie: bool,
}

/// Read-only summary of the committed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub personal: ReviewSection<PersonalDraft>,
    pub address: ReviewSection<AddressDraft>,
    pub document: ReviewSection<DocumentReview>,
    pub selfie: ReviewSection<SelfieReview>,
}

impl ReviewSummary {
    pub fn from_record(record: &FormValues) -> Self {
        let document = &record.document;
        Self {
            personal: ReviewSection::new(KycStep::Personal, record.personal.clone()),
            address: ReviewSection::new(KycStep::Address, record.address.clone()),
            document: ReviewSection::new(
                KycStep::Document,
                DocumentReview {
                    document_type: document.document_type.clone(),
                    document_type_label: DocumentType::parse(document.document_type.trim())
                        .map(DocumentType::label),
                    document_number: document.document_number.clone(),
                    issuing_country: document.issuing_country.clone(),
                    file_front: document.document_front.is_some(),
                    file_back: document.document_back.is_some(),
                },
            ),
            selfie: ReviewSection::new(
                KycStep::Selfie,
                SelfieReview {
                    has_selfie: record.selfie.selfie.is_some(),
                },
            ),
        }
    }
}
