//! Form orchestration: per-step validation, atomic commits into the shared record,
//! attachment slots that outlive step changes, and the submission state machine.
//!
//! The wizard keeps two copies of the form. `drafts` holds whatever the user has typed
//! or attached on every step and survives navigation in both directions. `record` only
//! changes when a step passes its schema, so an invalid step never leaks into it. Editing
//! a step that was already committed takes it out of the committed set again; jumping
//! forward is allowed only across committed steps, which keeps the review page and the
//! final payload in line with what the user last saw.

mod view;

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Attachment, AttachmentSlot, Field, KycStep};
use super::gateway::{Notifier, SubmissionError, SubmissionGateway, SubmissionReceipt};
use super::schema::{AttachmentRule, FieldErrors, FormValues, KycSubmission, ValidationContext};
use super::sequencer::{SequencerOptions, StepSequencer};
use super::uploads::{
    CameraConstraints, CameraError, CameraSession, FileEvent, FileRejection, FileSlot,
    MediaDevices, PreviewRegistry, SlotStatus, UploadOptions,
};
use crate::config::IntakeConfig;

pub use view::{
    DocumentReview, ReviewSection, ReviewSummary, SelfieReview, SlotView, WizardPhase, WizardView,
};

pub const SUBMISSION_SUCCESS_MESSAGE: &str = "KYC enviado!";
pub const SUBMISSION_FAILURE_MESSAGE: &str =
    "Não foi possível enviar seus dados. Tente novamente.";

/// Result of pressing "next" on an editing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Advanced { from: KycStep, to: KycStep },
    Invalid { errors: FieldErrors },
}

/// First half of a submission: either the payload to send or the errors that block it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStart {
    Ready(KycSubmission),
    Invalid { step: KycStep, errors: FieldErrors },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(SubmissionReceipt),
    Invalid { step: KycStep, errors: FieldErrors },
    Failed(SubmissionError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("field '{field}' is not editable on the '{}' step", .step.id())]
    FieldNotInStep { field: Field, step: KycStep },
    #[error("step {index} does not exist")]
    StepOutOfRange { index: usize },
    #[error("step {index} is locked until the previous steps are completed")]
    StepLocked { index: usize },
    #[error("the form is locked while it is being submitted")]
    Submitting,
    #[error("a submission is already in progress")]
    SubmissionPending,
    #[error("the form can only be submitted from the review step")]
    NotReviewing,
    #[error("the review step is completed by submitting the form")]
    AtReview,
    #[error("the form has already been submitted")]
    Completed,
    #[error("no submission is in progress")]
    NoPendingSubmission,
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Upload slots owned by the wizard rather than by the mounted step.
#[derive(Debug)]
struct AttachmentSlots {
    document_front: FileSlot,
    document_back: FileSlot,
    selfie: FileSlot,
}

impl AttachmentSlots {
    fn new(config: &IntakeConfig, previews: &PreviewRegistry) -> Self {
        let slot = |kind: AttachmentSlot| {
            FileSlot::new(
                UploadOptions {
                    accept: Some(kind.accept().to_string()),
                    max_size_mb: config.attachment_max_mb,
                    preview: true,
                },
                previews.clone(),
            )
        };
        Self {
            document_front: slot(AttachmentSlot::DocumentFront),
            document_back: slot(AttachmentSlot::DocumentBack),
            selfie: slot(AttachmentSlot::Selfie),
        }
    }

    fn get(&self, slot: AttachmentSlot) -> &FileSlot {
        match slot {
            AttachmentSlot::DocumentFront => &self.document_front,
            AttachmentSlot::DocumentBack => &self.document_back,
            AttachmentSlot::Selfie => &self.selfie,
        }
    }

    fn get_mut(&mut self, slot: AttachmentSlot) -> &mut FileSlot {
        match slot {
            AttachmentSlot::DocumentFront => &mut self.document_front,
            AttachmentSlot::DocumentBack => &mut self.document_back,
            AttachmentSlot::Selfie => &mut self.selfie,
        }
    }
}

/// Abandons the submission if the gateway future is dropped before it resolves.
struct PendingSubmission<'a> {
    wizard: &'a mut KycWizard,
    settled: bool,
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.wizard.abandon_submission();
        }
    }
}

#[derive(Debug)]
pub struct KycWizard {
    sequencer: StepSequencer<KycStep>,
    drafts: FormValues,
    record: FormValues,
    committed: BTreeSet<KycStep>,
    slots: AttachmentSlots,
    errors: FieldErrors,
    touched: BTreeSet<Field>,
    submit_attempted: bool,
    submitting: bool,
    receipt: Option<SubmissionReceipt>,
    last_failure: Option<String>,
    camera: Option<CameraSession>,
    camera_error: Option<CameraError>,
    attachment_rule: AttachmentRule,
    capture_quality: u8,
    today: Option<NaiveDate>,
    previews: PreviewRegistry,
}

impl Default for KycWizard {
    fn default() -> Self {
        Self::new(&IntakeConfig::default())
    }
}

impl KycWizard {
    pub fn new(config: &IntakeConfig) -> Self {
        Self::with_previews(config, PreviewRegistry::new())
    }

    pub fn with_previews(config: &IntakeConfig, previews: PreviewRegistry) -> Self {
        let sequencer =
            StepSequencer::new(KycStep::ordered().to_vec(), SequencerOptions::default())
                .with_hook(|next, previous| debug!(next, previous, "wizard step changed"));

        Self {
            sequencer,
            drafts: FormValues::default(),
            record: FormValues::default(),
            committed: BTreeSet::new(),
            slots: AttachmentSlots::new(config, &previews),
            errors: FieldErrors::default(),
            touched: BTreeSet::new(),
            submit_attempted: false,
            submitting: false,
            receipt: None,
            last_failure: None,
            camera: None,
            camera_error: None,
            attachment_rule: AttachmentRule::with_max_size_mb(config.attachment_max_mb),
            capture_quality: config.capture_jpeg_quality,
            today: None,
            previews,
        }
    }

    /// Pins the date used for the age-of-majority rule.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn current_step(&self) -> KycStep {
        self.sequencer
            .current_step()
            .copied()
            .unwrap_or(KycStep::Personal)
    }

    pub fn current_index(&self) -> usize {
        self.sequencer.current_index()
    }

    pub fn progress(&self) -> u8 {
        self.sequencer.progress()
    }

    pub fn phase(&self) -> WizardPhase {
        if self.receipt.is_some() {
            WizardPhase::Completed
        } else if self.submitting {
            WizardPhase::Submitting
        } else if self.current_step() == KycStep::Review {
            WizardPhase::Reviewing
        } else {
            WizardPhase::Editing(self.current_index())
        }
    }

    /// Working values of every step, including uncommitted edits.
    pub fn values(&self) -> &FormValues {
        &self.drafts
    }

    /// Values of the steps that passed validation.
    pub fn record(&self) -> &FormValues {
        &self.record
    }

    pub fn is_committed(&self, step: KycStep) -> bool {
        self.committed.contains(&step)
    }

    /// Every current error of the active step, shown or not.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Errors of touched fields, or of the whole step once "next" was pressed.
    pub fn visible_errors(&self) -> FieldErrors {
        if self.submit_attempted {
            return self.errors.clone();
        }
        self.errors.filtered(|field| self.touched.contains(&field))
    }

    pub fn slot(&self, slot: AttachmentSlot) -> &FileSlot {
        self.slots.get(slot)
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn camera_active(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraSession::is_active)
    }

    pub fn camera_error(&self) -> Option<&CameraError> {
        self.camera_error.as_ref()
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn review(&self) -> Option<ReviewSummary> {
        matches!(self.current_step(), KycStep::Review)
            .then(|| ReviewSummary::from_record(&self.record))
    }

    pub fn view(&self) -> WizardView {
        let step = self.current_step();
        WizardView {
            phase: self.phase(),
            step: step.descriptor(),
            step_index: self.current_index(),
            total_steps: self.sequencer.total(),
            progress: self.progress(),
            is_first_step: self.sequencer.is_first_step(),
            is_last_step: self.sequencer.is_last_step(),
            values: self.drafts.step_values(step),
            errors: self.visible_errors(),
            attachments: AttachmentSlot::ALL
                .into_iter()
                .filter(|slot| slot.step() == step)
                .map(|slot| SlotView::of(slot, self.slots.get(slot)))
                .collect(),
            camera_active: self.camera_active(),
            camera_error: self.camera_error.as_ref().map(ToString::to_string),
            review: self.review(),
            last_failure: self.last_failure.clone(),
            receipt: self.receipt.clone(),
        }
    }

    /// Updates one text field of the active step and re-runs that step's rules.
    pub fn on_field_change(
        &mut self,
        field: Field,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let step = self.current_step();
        if field.attachment_slot().is_some() || field.step() != step {
            return Err(WizardError::FieldNotInStep { field, step });
        }
        let Some(target) = self.drafts.text_mut(field) else {
            return Err(WizardError::FieldNotInStep { field, step });
        };

        let value = value.into();
        if *target != value {
            *target = value;
            self.committed.remove(&step);
        }
        self.touched.insert(field);
        self.revalidate();
        Ok(())
    }

    /// Programmatic `setFile`; `None` empties the slot.
    pub fn set_attachment(
        &mut self,
        slot: AttachmentSlot,
        file: Option<Attachment>,
    ) -> Result<SlotStatus, WizardError> {
        self.with_slot(slot, |state| state.set_file(file))
    }

    pub fn input_change(
        &mut self,
        slot: AttachmentSlot,
        event: &FileEvent,
    ) -> Result<SlotStatus, WizardError> {
        self.with_slot(slot, |state| state.on_input_change(event))
    }

    pub fn drop_file(
        &mut self,
        slot: AttachmentSlot,
        event: &mut FileEvent,
    ) -> Result<SlotStatus, WizardError> {
        self.with_slot(slot, |state| state.on_drop(event))
    }

    pub fn drag_over(
        &mut self,
        slot: AttachmentSlot,
        event: &mut FileEvent,
    ) -> Result<(), WizardError> {
        self.ensure_slot_active(slot)?;
        self.slots.get_mut(slot).on_drag_over(event);
        Ok(())
    }

    pub fn drag_leave(
        &mut self,
        slot: AttachmentSlot,
        event: &mut FileEvent,
    ) -> Result<(), WizardError> {
        self.ensure_slot_active(slot)?;
        self.slots.get_mut(slot).on_drag_leave(event);
        Ok(())
    }

    pub fn remove_file(&mut self, slot: AttachmentSlot) -> Result<SlotStatus, WizardError> {
        self.with_slot(slot, |state| {
            state.remove_file();
            Ok(())
        })
    }

    pub fn clear_attachment_error(&mut self, slot: AttachmentSlot) -> Result<(), WizardError> {
        self.ensure_slot_active(slot)?;
        self.slots.get_mut(slot).clear_error();
        Ok(())
    }

    /// Validates exactly the active step; only a clean pass is merged into the record.
    pub fn next(&mut self) -> Result<StepOutcome, WizardError> {
        self.ensure_editable()?;
        let from = self.current_step();
        if from == KycStep::Review {
            return Err(WizardError::AtReview);
        }

        self.submit_attempted = true;
        self.revalidate();
        if !self.errors.is_empty() {
            debug!(
                step = from.id(),
                fields = ?self.errors.fields().map(Field::name).collect::<Vec<_>>(),
                "step submission rejected"
            );
            return Ok(StepOutcome::Invalid {
                errors: self.errors.clone(),
            });
        }

        self.record.merge(self.drafts.step_values(from));
        self.committed.insert(from);
        info!(step = from.id(), "step committed");

        self.move_to(from.index() + 1);
        Ok(StepOutcome::Advanced {
            from,
            to: self.current_step(),
        })
    }

    pub fn back(&mut self) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        match self.current_index() {
            0 => Ok(false),
            index => Ok(self.move_to(index - 1)),
        }
    }

    /// Jumps backward freely; forward only across committed steps.
    pub fn go_to_step(&mut self, index: usize) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        if index >= self.sequencer.total() {
            return Err(WizardError::StepOutOfRange { index });
        }
        if index > self.current_index() {
            let open = KycStep::ordered()
                .into_iter()
                .take(index)
                .any(|step| !self.committed.contains(&step));
            if open {
                return Err(WizardError::StepLocked { index });
            }
        }
        Ok(self.move_to(index))
    }

    /// Re-validates the whole committed record and, if clean, locks the form for sending.
    pub fn begin_submission(&mut self) -> Result<SubmissionStart, WizardError> {
        if self.receipt.is_some() {
            return Err(WizardError::Completed);
        }
        if self.submitting {
            return Err(WizardError::SubmissionPending);
        }
        if self.current_step() != KycStep::Review {
            return Err(WizardError::NotReviewing);
        }

        let context = self.context();
        match self.record.validate_all(&context) {
            Ok(payload) => {
                self.submitting = true;
                self.last_failure = None;
                info!(
                    attachments = payload.attachments().count(),
                    "submission started"
                );
                Ok(SubmissionStart::Ready(payload))
            }
            Err(errors) => {
                let step = errors.first_step().unwrap_or(KycStep::Personal);
                for failing in KycStep::ordered() {
                    if !errors.for_step(failing).is_empty() {
                        self.committed.remove(&failing);
                    }
                }
                warn!(
                    step = step.id(),
                    fields = ?errors.fields().map(Field::name).collect::<Vec<_>>(),
                    "final validation failed"
                );
                self.move_to(step.index());
                self.submit_attempted = true;
                Ok(SubmissionStart::Invalid { step, errors })
            }
        }
    }

    /// Settles a pending submission. Entered values are kept either way.
    pub fn finish_submission<N: Notifier + ?Sized>(
        &mut self,
        outcome: Result<SubmissionReceipt, SubmissionError>,
        notifier: &N,
    ) -> Result<SubmitOutcome, WizardError> {
        if !self.submitting {
            return Err(WizardError::NoPendingSubmission);
        }
        self.submitting = false;

        match outcome {
            Ok(receipt) => {
                info!(reference = %receipt.reference, "submission accepted");
                self.close_camera();
                self.receipt = Some(receipt.clone());
                notifier.notify_success(SUBMISSION_SUCCESS_MESSAGE);
                Ok(SubmitOutcome::Accepted(receipt))
            }
            Err(error) => {
                warn!(error = %error, "submission failed");
                self.last_failure = Some(SUBMISSION_FAILURE_MESSAGE.to_string());
                notifier.notify_failure(SUBMISSION_FAILURE_MESSAGE);
                Ok(SubmitOutcome::Failed(error))
            }
        }
    }

    /// Releases a submission whose outcome will never arrive, e.g. because the caller
    /// went away mid-flight. The form returns to review with the failure message so the
    /// user can retry. Returns `false` when nothing was pending.
    pub fn abandon_submission(&mut self) -> bool {
        if !self.submitting {
            return false;
        }
        self.submitting = false;
        self.last_failure = Some(SUBMISSION_FAILURE_MESSAGE.to_string());
        warn!("submission abandoned before the gateway answered");
        true
    }

    /// Runs both halves of a submission against the given collaborators.
    pub async fn submit<G, N>(
        &mut self,
        gateway: &G,
        notifier: &N,
    ) -> Result<SubmitOutcome, WizardError>
    where
        G: SubmissionGateway,
        N: Notifier + ?Sized,
    {
        match self.begin_submission()? {
            SubmissionStart::Ready(payload) => {
                let mut pending = PendingSubmission {
                    wizard: self,
                    settled: false,
                };
                let outcome = gateway.submit(payload).await;
                pending.settled = true;
                pending.wizard.finish_submission(outcome, notifier)
            }
            SubmissionStart::Invalid { step, errors } => {
                Ok(SubmitOutcome::Invalid { step, errors })
            }
        }
    }

    /// Acquires the camera for the selfie step. Failures are kept for display.
    pub async fn open_camera<M: MediaDevices>(
        &mut self,
        devices: &M,
    ) -> Result<(), WizardError> {
        self.ensure_slot_active(AttachmentSlot::Selfie)?;
        self.close_camera();

        match CameraSession::open(devices, &CameraConstraints::default(), self.capture_quality)
            .await
        {
            Ok(session) => {
                self.camera = Some(session);
                self.camera_error = None;
                Ok(())
            }
            Err(error) => {
                self.camera_error = Some(error.clone());
                Err(WizardError::Camera(error))
            }
        }
    }

    /// Grabs a frame into the selfie slot; the camera is released either way.
    pub fn capture_selfie(
        &mut self,
        captured_at: DateTime<Utc>,
    ) -> Result<SlotStatus, WizardError> {
        self.ensure_slot_active(AttachmentSlot::Selfie)?;
        let mut session = self
            .camera
            .take()
            .ok_or(WizardError::Camera(CameraError::NotActive))?;

        let file = match session.capture(captured_at) {
            Ok(file) => file,
            Err(error) => {
                self.camera_error = Some(error.clone());
                return Err(error.into());
            }
        };
        drop(session);
        self.set_attachment(AttachmentSlot::Selfie, Some(file))
    }

    /// Discards the current selfie and restarts the camera.
    pub async fn retake_selfie<M: MediaDevices>(
        &mut self,
        devices: &M,
    ) -> Result<(), WizardError> {
        self.remove_file(AttachmentSlot::Selfie)?;
        self.open_camera(devices).await
    }

    pub fn close_camera(&mut self) {
        if self.camera.take().is_some() {
            debug!("camera released");
        }
    }

    fn context(&self) -> ValidationContext {
        ValidationContext::on(self.today.unwrap_or_else(|| Local::now().date_naive()))
            .with_attachment_rule(self.attachment_rule.clone())
    }

    fn revalidate(&mut self) {
        let context = self.context();
        self.errors = self.drafts.validate_step(self.current_step(), &context);
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.receipt.is_some() {
            return Err(WizardError::Completed);
        }
        if self.submitting {
            return Err(WizardError::Submitting);
        }
        Ok(())
    }

    fn ensure_slot_active(&self, slot: AttachmentSlot) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let step = self.current_step();
        if slot.step() != step {
            return Err(WizardError::FieldNotInStep {
                field: slot.field(),
                step,
            });
        }
        Ok(())
    }

    /// Applies a slot mutation and mirrors the slot's file into the drafts.
    ///
    /// A rejected file is not a wizard error: the slot keeps the rejection for display and
    /// the caller gets [`SlotStatus::Rejected`].
    fn with_slot(
        &mut self,
        slot: AttachmentSlot,
        apply: impl FnOnce(&mut FileSlot) -> Result<(), FileRejection>,
    ) -> Result<SlotStatus, WizardError> {
        self.ensure_slot_active(slot)?;

        let state = self.slots.get_mut(slot);
        match apply(state) {
            Ok(()) => debug!(slot = ?slot, "attachment slot updated"),
            Err(rejection) => info!(slot = ?slot, reason = %rejection, "attachment refused"),
        }
        let status = state.status();
        let held = state.file().cloned();

        let field = slot.field();
        if let Some(target) = self.drafts.attachment_mut(field) {
            if *target != held {
                *target = held;
                self.committed.remove(&slot.step());
            }
        }
        self.touched.insert(field);
        self.revalidate();
        Ok(status)
    }

    /// Any step change releases the camera and resets the submit-attempt flag.
    fn move_to(&mut self, index: usize) -> bool {
        self.close_camera();
        let moved = self.sequencer.go_to_step(index as isize);
        if moved {
            self.submit_attempted = false;
            self.camera_error = None;
        }
        self.revalidate();
        moved
    }
}
