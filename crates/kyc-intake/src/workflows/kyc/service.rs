use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{Attachment, AttachmentSlot, Field};
use super::gateway::{Notifier, SubmissionError, SubmissionGateway, SubmissionReceipt};
use super::uploads::{PreviewRegistry, SlotStatus};
use super::wizard::{
    KycWizard, StepOutcome, SubmissionStart, SubmitOutcome, WizardError, WizardView,
};
use crate::config::IntakeConfig;

/// Identifier wrapper for live wizard sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub view: WizardView,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("kyc-{id:06}"))
}

type SharedWizard = Arc<Mutex<KycWizard>>;

struct Session {
    wizard: SharedWizard,
    last_seen: Instant,
}

/// A submission handed to the gateway. Dropping it before [`InFlight::settle`] runs
/// (client gone, task aborted, gateway panic) hands the form back for a retry.
struct InFlight {
    session_id: SessionId,
    wizard: SharedWizard,
    settled: bool,
}

impl InFlight {
    fn settle<N: Notifier + ?Sized>(
        mut self,
        outcome: Result<SubmissionReceipt, SubmissionError>,
        notifier: &N,
    ) -> Result<(SubmitOutcome, WizardView), WizardError> {
        self.settled = true;
        let mut wizard = lock(&self.wizard);
        let result = wizard.finish_submission(outcome, notifier)?;
        Ok((result, wizard.view()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if lock(&self.wizard).abandon_submission() {
            warn!(session = %self.session_id, "in-flight submission dropped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hosts one wizard per session and wires them to the outbound collaborators.
pub struct KycIntakeService<G, N> {
    gateway: Arc<G>,
    notifier: Arc<N>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    config: IntakeConfig,
    previews: PreviewRegistry,
    today: Option<NaiveDate>,
}

impl<G, N> KycIntakeService<G, N>
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    pub fn new(gateway: Arc<G>, notifier: Arc<N>, config: IntakeConfig) -> Self {
        Self {
            gateway,
            notifier,
            sessions: Mutex::new(HashMap::new()),
            config,
            previews: PreviewRegistry::new(),
            today: None,
        }
    }

    /// Pins the date every new session validates birth dates against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Starts a new session. Sessions idle for longer than the configured TTL are
    /// evicted first.
    pub fn start(&self) -> SessionSnapshot {
        self.evict_idle();
        let mut wizard = KycWizard::with_previews(&self.config, self.previews.clone());
        if let Some(today) = self.today {
            wizard = wizard.with_today(today);
        }
        let view = wizard.view();
        let session_id = next_session_id();
        lock(&self.sessions).insert(
            session_id.clone(),
            Session {
                wizard: Arc::new(Mutex::new(wizard)),
                last_seen: Instant::now(),
            },
        );
        info!(session = %session_id, "intake session started");
        SessionSnapshot { session_id, view }
    }

    /// Drops the session, releasing its previews and any open camera.
    pub fn close(&self, id: &SessionId) -> Result<(), ServiceError> {
        let removed = lock(&self.sessions).remove(id);
        match removed {
            Some(_) => {
                info!(session = %id, "intake session closed");
                Ok(())
            }
            None => Err(ServiceError::NotFound(id.clone())),
        }
    }

    /// Drops every session not touched within the TTL, except those mid-submission.
    pub fn evict_idle(&self) -> usize {
        let ttl = self.config.session_ttl();
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep =
                session.last_seen.elapsed() < ttl || lock(&session.wizard).is_submitting();
            if !keep {
                debug!(session = %id, "idle intake session evicted");
            }
            keep
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "idle intake sessions evicted");
        }
        evicted
    }

    pub fn view(&self, id: &SessionId) -> Result<WizardView, ServiceError> {
        self.with_wizard(id, |wizard| Ok(wizard.view()))
    }

    pub fn update_field(
        &self,
        id: &SessionId,
        field: Field,
        value: String,
    ) -> Result<WizardView, ServiceError> {
        self.with_wizard(id, |wizard| {
            wizard.on_field_change(field, value)?;
            Ok(wizard.view())
        })
    }

    pub fn set_attachment(
        &self,
        id: &SessionId,
        slot: AttachmentSlot,
        file: Attachment,
    ) -> Result<(SlotStatus, WizardView), ServiceError> {
        self.with_wizard(id, |wizard| {
            let status = wizard.set_attachment(slot, Some(file))?;
            Ok((status, wizard.view()))
        })
    }

    pub fn remove_attachment(
        &self,
        id: &SessionId,
        slot: AttachmentSlot,
    ) -> Result<WizardView, ServiceError> {
        self.with_wizard(id, |wizard| {
            wizard.remove_file(slot)?;
            Ok(wizard.view())
        })
    }

    pub fn next(&self, id: &SessionId) -> Result<(StepOutcome, WizardView), ServiceError> {
        self.with_wizard(id, |wizard| {
            let outcome = wizard.next()?;
            Ok((outcome, wizard.view()))
        })
    }

    pub fn back(&self, id: &SessionId) -> Result<WizardView, ServiceError> {
        self.with_wizard(id, |wizard| {
            wizard.back()?;
            Ok(wizard.view())
        })
    }

    pub fn go_to_step(&self, id: &SessionId, index: usize) -> Result<WizardView, ServiceError> {
        self.with_wizard(id, |wizard| {
            wizard.go_to_step(index)?;
            Ok(wizard.view())
        })
    }

    /// The session lock is released while the gateway call is in flight; a second
    /// submit in that window is refused as pending. An accepted session is closed,
    /// the returned view being its final state.
    pub async fn submit(
        &self,
        id: &SessionId,
    ) -> Result<(SubmitOutcome, WizardView), ServiceError> {
        let session = self.session(id)?;
        let start = lock(&session).begin_submission()?;

        match start {
            SubmissionStart::Ready(payload) => {
                let in_flight = InFlight {
                    session_id: id.clone(),
                    wizard: session,
                    settled: false,
                };
                let outcome = self.gateway.submit(payload).await;
                let (result, view) = in_flight.settle(outcome, self.notifier.as_ref())?;
                if matches!(result, SubmitOutcome::Accepted(_)) {
                    lock(&self.sessions).remove(id);
                    info!(session = %id, "intake session completed and released");
                }
                Ok((result, view))
            }
            SubmissionStart::Invalid { step, errors } => {
                let view = lock(&session).view();
                Ok((SubmitOutcome::Invalid { step, errors }, view))
            }
        }
    }

    fn session(&self, id: &SessionId) -> Result<SharedWizard, ServiceError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        session.last_seen = Instant::now();
        Ok(session.wizard.clone())
    }

    fn with_wizard<T>(
        &self,
        id: &SessionId,
        apply: impl FnOnce(&mut KycWizard) -> Result<T, WizardError>,
    ) -> Result<T, ServiceError> {
        let session = self.session(id)?;
        let mut wizard = lock(&session);
        Ok(apply(&mut wizard)?)
    }
}

/// Error raised by the intake service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("intake session '{0}' not found")]
    NotFound(SessionId),
    #[error(transparent)]
    Wizard(#[from] WizardError),
}
