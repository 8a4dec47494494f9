//! Wizard session — owns one snapshot, its navigation state, and the async
//! work (verification, OTP, submission) that runs against it.
//!
//! Observers subscribe to [`SessionEvent`]s and recompute whatever they
//! display; nothing derived from the snapshot is cached here.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::evaluator::{
    StepCompletion, are_all_steps_completed, completion_summary, compute_first_incomplete_step,
    is_step_complete,
};
use super::guard::{NavigationBlocked, request_step};
use super::model::{FormSnapshot, VerificationPolicy};
use super::otp::{OtpChannel, OtpService};
use super::registry::Strictness;
use super::state::{FlowMode, StepKey, WizardState};
use super::submission::{SubmissionCoordinator, SubmissionReceipt, SubmissionTarget};
use super::validation::{FieldError, validate_step};
use super::verification::{VerificationOrchestrator, VerificationReport};
use crate::error::{Error, OtpError, SubmissionError};

/// Broadcast channel capacity for session events.
const EVENT_CAPACITY: usize = 64;

/// Shown while the document checks are in flight.
pub const VERIFYING_LABEL: &str = "Verifying…";

/// Something observers should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SnapshotChanged { generation: u64, revision: u64 },
    StepChanged { from: StepKey, to: StepKey },
    VerificationStarted { generation: u64 },
    VerificationFinished { generation: u64, may_advance: bool },
    Submitted { company_id: Option<String> },
    Reset { mode: FlowMode, generation: u64 },
}

/// What pressing "Next" did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NextOutcome {
    Advanced { from: StepKey, to: StepKey },
    /// The current step has field errors; nothing moved.
    Invalid { errors: Vec<FieldError> },
    VerificationFailed { report: VerificationReport },
    /// A verification or submission is already running.
    Busy,
    Submitted { receipt: SubmissionReceipt },
    SubmissionFailed { message: String },
    /// The session was restarted or moved while the checks ran.
    Stale,
    NoFurtherStep,
}

/// Point-in-time view for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub step: StepKey,
    pub mode: FlowMode,
    pub generation: u64,
    pub revision: u64,
    pub verifying: bool,
    pub first_incomplete: StepKey,
    pub can_submit: bool,
    pub steps: Vec<StepCompletion>,
}

struct SessionInner {
    snapshot: FormSnapshot,
    state: WizardState,
    target: SubmissionTarget,
    submitting: bool,
}

pub struct WizardSession {
    id: Uuid,
    inner: RwLock<SessionInner>,
    tx: broadcast::Sender<SessionEvent>,
    orchestrator: VerificationOrchestrator,
    coordinator: SubmissionCoordinator,
    otp: Arc<dyn OtpService>,
}

impl WizardSession {
    /// A fresh add-mode session.
    pub fn new(
        orchestrator: VerificationOrchestrator,
        coordinator: SubmissionCoordinator,
        otp: Arc<dyn OtpService>,
    ) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        let snapshot = FormSnapshot::fresh(orchestrator.policy());
        Arc::new(Self {
            id: Uuid::new_v4(),
            inner: RwLock::new(SessionInner {
                snapshot,
                state: WizardState::new(FlowMode::Add),
                target: SubmissionTarget::Create,
                submitting: false,
            }),
            tx,
            orchestrator,
            coordinator,
            otp,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn policy(&self) -> &VerificationPolicy {
        self.orchestrator.policy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn state(&self) -> WizardState {
        self.inner.read().await.state.clone()
    }

    pub async fn target(&self) -> SubmissionTarget {
        self.inner.read().await.target.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.read().await;
        let mode = inner.state.mode;
        SessionStatus {
            session_id: self.id,
            step: inner.state.step,
            mode,
            generation: inner.state.generation,
            revision: inner.state.revision,
            verifying: inner.state.verifying,
            first_incomplete: compute_first_incomplete_step(&inner.snapshot, mode),
            can_submit: mode != FlowMode::View && are_all_steps_completed(&inner.snapshot, mode),
            steps: completion_summary(&inner.snapshot, mode),
        }
    }

    /// Swap in a whole snapshot under a new generation. Any verification,
    /// OTP or submission still in flight for the old one is discarded when
    /// it lands. Returns the new generation.
    pub async fn replace(
        &self,
        snapshot: FormSnapshot,
        mode: FlowMode,
        target: SubmissionTarget,
    ) -> u64 {
        let generation = {
            let mut inner = self.inner.write().await;
            inner.state.restart(mode);
            inner.snapshot = snapshot;
            inner.target = target;
            inner.submitting = false;
            inner.state.generation
        };
        info!(session_id = %self.id, mode = %mode, generation, "Onboarding session reset");
        self.emit(SessionEvent::Reset { mode, generation });
        generation
    }

    /// Start a brand-new onboarding.
    pub async fn start_new(&self) -> u64 {
        let snapshot = FormSnapshot::fresh(self.policy());
        self.replace(snapshot, FlowMode::Add, SubmissionTarget::Create)
            .await
    }

    /// Load a saved onboarding for editing, or for viewing when `read_only`.
    pub async fn open(
        &self,
        company_id: &str,
        location_id: &str,
        read_only: bool,
    ) -> Result<(), Error> {
        let mode = if read_only { FlowMode::View } else { FlowMode::Edit };
        let target = SubmissionTarget::Update {
            company_id: company_id.to_string(),
            location_id: location_id.to_string(),
        };
        let generation = self
            .replace(FormSnapshot::fresh(self.policy()), mode, target)
            .await;

        let record = match self.coordinator.api().fetch(company_id, location_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(company_id, location_id, error = %e, "Failed to load saved onboarding");
                self.start_new().await;
                return Err(e.into());
            }
        };

        let snapshot = FormSnapshot::from_record(&record, self.policy());
        let revision = {
            let mut inner = self.inner.write().await;
            if inner.state.generation != generation {
                debug!(generation, "Session restarted while loading; dropping record");
                return Ok(());
            }
            inner.snapshot = snapshot;
            inner.state.revision += 1;
            inner.state.revision
        };
        info!(company_id, location_id, mode = %mode, "Loaded saved onboarding");
        self.emit(SessionEvent::SnapshotChanged {
            generation,
            revision,
        });
        Ok(())
    }

    /// Apply a field-level mutation.
    ///
    /// Changing a document number drops that document's verification, and
    /// changing the owner's phone or email drops its OTP verification.
    pub async fn edit<R>(&self, f: impl FnOnce(&mut FormSnapshot) -> R) -> Result<R, Error> {
        let (out, generation, revision) = {
            let mut inner = self.inner.write().await;
            if inner.state.mode == FlowMode::View {
                return Err(Error::ReadOnly);
            }
            let before = inner.snapshot.clone();
            let out = f(&mut inner.snapshot);
            invalidate_changed(&before, &mut inner.snapshot, self.orchestrator.policy());
            inner.state.revision += 1;
            (out, inner.state.generation, inner.state.revision)
        };
        self.emit(SessionEvent::SnapshotChanged {
            generation,
            revision,
        });
        Ok(out)
    }

    /// Take a whole snapshot edited by the UI.
    ///
    /// Verification flags and errors are server-owned: they carry over from
    /// the current snapshot where the checked value is unchanged and are
    /// dropped otherwise. An empty password keeps the one already entered.
    pub async fn apply_client_snapshot(&self, incoming: FormSnapshot) -> Result<(), Error> {
        let policy = self.policy().clone();
        self.edit(move |current| {
            *current = merge_client_snapshot(current, incoming, &policy);
        })
        .await
    }

    /// Jump straight to `target`.
    pub async fn go_to(&self, target: StepKey) -> Result<StepKey, NavigationBlocked> {
        let current = {
            let mut inner = self.inner.write().await;
            let current = inner.state.step;
            let mode = inner.state.mode;
            let step = if mode == FlowMode::View && !target.is_terminal() {
                target
            } else {
                request_step(&inner.snapshot, mode, current, target).map_err(|blocked| {
                    debug!(
                        requested = %target,
                        first_incomplete = %blocked.first_incomplete,
                        "Navigation blocked"
                    );
                    blocked
                })?
            };
            if step == current {
                return Ok(step);
            }
            inner.state.move_to(step)
        };
        info!(from = %current, to = %target, "Step changed");
        self.emit(SessionEvent::StepChanged {
            from: current,
            to: target,
        });
        Ok(target)
    }

    /// Validate the current step, verify documents when leaving the
    /// documents step, then move on. "Next" on the last form step submits.
    ///
    /// In view mode "Next" only navigates.
    pub async fn next(&self) -> NextOutcome {
        let mut inner = self.inner.write().await;
        if inner.state.verifying || inner.submitting {
            return NextOutcome::Busy;
        }
        let current = inner.state.step;
        let mode = inner.state.mode;
        if current.is_terminal() {
            return NextOutcome::NoFurtherStep;
        }

        if mode != FlowMode::View {
            let errors = validate_step(&inner.snapshot, current, mode);
            if !errors.is_empty() {
                debug!(step = %current, errors = errors.len(), "Step has field errors");
                return NextOutcome::Invalid { errors };
            }
            if current.is_last_form_step() {
                drop(inner);
                return match self.submit().await {
                    Ok(receipt) => NextOutcome::Submitted { receipt },
                    Err(SubmissionError::InProgress) => NextOutcome::Busy,
                    Err(SubmissionError::Invalid { errors }) => NextOutcome::Invalid { errors },
                    Err(e) => NextOutcome::SubmissionFailed {
                        message: e.to_string(),
                    },
                };
            }
            if current == StepKey::DocumentDetails {
                inner.state.verifying = true;
                let generation = inner.state.generation;
                let snapshot = inner.snapshot.clone();
                drop(inner);
                return self.verify_and_advance(generation, snapshot).await;
            }
        }

        let Some(to) = current.next().filter(|s| !s.is_terminal()) else {
            return NextOutcome::NoFurtherStep;
        };
        inner.state.move_to(to);
        drop(inner);
        info!(from = %current, to = %to, "Step changed");
        self.emit(SessionEvent::StepChanged { from: current, to });
        NextOutcome::Advanced { from: current, to }
    }

    async fn verify_and_advance(&self, generation: u64, snapshot: FormSnapshot) -> NextOutcome {
        self.emit(SessionEvent::VerificationStarted { generation });
        let report = self.orchestrator.run(&snapshot).await;

        let (may_advance, still_here, revision) = {
            let mut inner = self.inner.write().await;
            if inner.state.generation != generation {
                debug!(generation, "Session restarted during verification; dropping result");
                return NextOutcome::Stale;
            }
            inner.state.verifying = false;
            let applied = report.apply(&mut inner.snapshot);
            debug!(applied, calls = report.calls_made, "Applied verification results");

            let may_advance = report.may_advance()
                && is_step_complete(
                    &inner.snapshot,
                    StepKey::DocumentDetails,
                    inner.state.mode,
                    Strictness::Strict,
                );
            let still_here = inner.state.step == StepKey::DocumentDetails;
            if may_advance && still_here {
                inner.state.move_to(StepKey::PersonalDetails);
            }
            inner.state.revision += 1;
            (may_advance, still_here, inner.state.revision)
        };

        self.emit(SessionEvent::SnapshotChanged {
            generation,
            revision,
        });
        self.emit(SessionEvent::VerificationFinished {
            generation,
            may_advance,
        });

        if !still_here {
            debug!("Step changed during verification; not advancing");
            return NextOutcome::Stale;
        }
        if !may_advance {
            info!(failures = report.failures().count(), "Document verification failed");
            return NextOutcome::VerificationFailed { report };
        }

        let (from, to) = (StepKey::DocumentDetails, StepKey::PersonalDetails);
        info!(from = %from, to = %to, "Step changed");
        self.emit(SessionEvent::StepChanged { from, to });
        NextOutcome::Advanced { from, to }
    }

    /// Submit the whole onboarding once, from the last form step.
    ///
    /// On success the session lands on the terminal step with a fresh
    /// snapshot. On failure the step and snapshot are left as they were.
    pub async fn submit(&self) -> Result<SubmissionReceipt, SubmissionError> {
        let (snapshot, mode, target, generation) = {
            let mut inner = self.inner.write().await;
            if inner.state.mode == FlowMode::View {
                return Err(SubmissionError::ReadOnly);
            }
            if inner.submitting || inner.state.verifying {
                return Err(SubmissionError::InProgress);
            }
            if !inner.state.step.is_last_form_step() {
                return Err(SubmissionError::StepNotReached {
                    step: StepKey::PersonalDetails.label().to_string(),
                });
            }
            inner.submitting = true;
            (
                inner.snapshot.clone(),
                inner.state.mode,
                inner.target.clone(),
                inner.state.generation,
            )
        };

        let result = self.coordinator.submit(&snapshot, mode, &target).await;

        let from = {
            let mut inner = self.inner.write().await;
            if inner.state.generation != generation {
                debug!(generation, "Session restarted during submission");
                return result;
            }
            inner.submitting = false;
            if result.is_err() {
                return result;
            }
            let from = inner.state.step;
            inner.state.restart(FlowMode::Add);
            inner.state.move_to(StepKey::ThankYou);
            inner.snapshot = FormSnapshot::fresh(self.orchestrator.policy());
            inner.target = SubmissionTarget::Create;
            from
        };

        let receipt = result?;
        self.emit(SessionEvent::Submitted {
            company_id: receipt.company_id.clone(),
        });
        self.emit(SessionEvent::StepChanged {
            from,
            to: StepKey::ThankYou,
        });
        Ok(receipt)
    }

    /// Send a one-time code to the owner's current phone or email.
    pub async fn send_otp(&self, channel: OtpChannel) -> Result<(), OtpError> {
        let target = {
            let inner = self.inner.read().await;
            channel.target(&inner.snapshot).to_string()
        };
        if target.is_empty() {
            return Err(OtpError::MissingTarget {
                channel: channel.to_string(),
            });
        }
        self.otp.send(channel, &target).await?;
        info!(channel = %channel, "OTP sent");
        Ok(())
    }

    /// Check a code. The contact is only marked verified if it is still the
    /// value the code was checked against.
    pub async fn verify_otp(&self, channel: OtpChannel, code: &str) -> Result<(), OtpError> {
        let (target, generation) = {
            let inner = self.inner.read().await;
            (
                channel.target(&inner.snapshot).to_string(),
                inner.state.generation,
            )
        };
        if target.is_empty() {
            return Err(OtpError::MissingTarget {
                channel: channel.to_string(),
            });
        }

        if !self.otp.verify(channel, &target, code.trim()).await? {
            info!(channel = %channel, "OTP rejected");
            return Err(OtpError::Rejected {
                channel: channel.to_string(),
            });
        }

        let revision = {
            let mut inner = self.inner.write().await;
            if inner.state.generation != generation || channel.target(&inner.snapshot) != target {
                warn!(channel = %channel, "Contact changed while verifying OTP");
                return Err(OtpError::TargetChanged {
                    channel: channel.to_string(),
                });
            }
            channel.mark_verified(&mut inner.snapshot);
            inner.state.revision += 1;
            inner.state.revision
        };
        info!(channel = %channel, "Contact verified");
        self.emit(SessionEvent::SnapshotChanged {
            generation,
            revision,
        });
        Ok(())
    }
}

/// Drop verification that no longer matches the value it was made for.
fn invalidate_changed(
    before: &FormSnapshot,
    after: &mut FormSnapshot,
    policy: &VerificationPolicy,
) {
    for doc in &mut after.documents {
        let changed = before
            .document(doc.kind)
            .is_none_or(|prev| prev.number.trim() != doc.number.trim());
        if changed {
            doc.verified = !policy.requires_verification(doc.kind);
            doc.error = None;
        }
    }
    if before.personal.phone.trim() != after.personal.phone.trim() {
        after.personal.phone_verified = false;
    }
    if before.personal.email.trim() != after.personal.email.trim() {
        after.personal.email_verified = false;
    }
}

fn merge_client_snapshot(
    current: &FormSnapshot,
    mut incoming: FormSnapshot,
    policy: &VerificationPolicy,
) -> FormSnapshot {
    for doc in &mut incoming.documents {
        match current.document(doc.kind) {
            Some(prev) if prev.number.trim() == doc.number.trim() => {
                doc.verified = prev.verified;
                doc.error = prev.error.clone();
            }
            _ => {
                doc.verified = !policy.requires_verification(doc.kind);
                doc.error = None;
            }
        }
    }

    let (cur, new) = (&current.personal, &mut incoming.personal);
    new.phone_verified = cur.phone_verified && cur.phone.trim() == new.phone.trim();
    new.email_verified = cur.email_verified && cur.email.trim() == new.email.trim();
    if new.password.is_empty() {
        new.password = cur.password.clone();
    }
    incoming
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::onboarding::evaluator::fixtures::complete_snapshot;
    use crate::onboarding::model::{BusinessType, DocumentKind, Password, SellingPlatform};
    use crate::onboarding::otp::testing::FixedOtp;
    use crate::onboarding::record::OnboardingRecord;
    use crate::onboarding::submission::ApiResponse;
    use crate::onboarding::submission::testing::RecordingApi;
    use crate::onboarding::verification::RegistryStatus;
    use crate::onboarding::verification::testing::ScriptedVerifier;

    struct Harness {
        session: Arc<WizardSession>,
        verifier: Arc<ScriptedVerifier>,
        api: Arc<RecordingApi>,
        otp: Arc<FixedOtp>,
    }

    fn harness_with(verifier: ScriptedVerifier, api: RecordingApi) -> Harness {
        let verifier = Arc::new(verifier);
        let api = Arc::new(api);
        let otp = Arc::new(FixedOtp::new("123456"));
        let session = WizardSession::new(
            VerificationOrchestrator::new(verifier.clone(), VerificationPolicy::default()),
            SubmissionCoordinator::new(api.clone()),
            otp.clone(),
        );
        Harness {
            session,
            verifier,
            api,
            otp,
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedVerifier::new(), RecordingApi::ok())
    }

    fn unverified_snapshot() -> FormSnapshot {
        let mut snapshot = complete_snapshot();
        for doc in &mut snapshot.documents {
            doc.verified = false;
        }
        snapshot
    }

    #[tokio::test]
    async fn next_on_empty_step_reports_field_errors() {
        let h = harness();
        match h.session.next().await {
            NextOutcome::Invalid { errors } => assert!(!errors.is_empty()),
            other => panic!("expected field errors, got {other:?}"),
        }
        assert_eq!(h.session.state().await.step, StepKey::CompanyDetails);
    }

    #[tokio::test]
    async fn walks_every_step_and_submits() {
        let h = harness();
        h.session
            .replace(unverified_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;

        for expected in [
            StepKey::AddressDetails,
            StepKey::BrandDetails,
            StepKey::DocumentDetails,
            StepKey::PersonalDetails,
        ] {
            match h.session.next().await {
                NextOutcome::Advanced { to, .. } => assert_eq!(to, expected),
                other => panic!("expected to reach {expected}, got {other:?}"),
            }
        }
        assert_eq!(h.verifier.call_count(), 3);

        match h.session.next().await {
            NextOutcome::Submitted { receipt } => {
                assert_eq!(receipt.company_id.as_deref(), Some("c-42"))
            }
            other => panic!("expected submission, got {other:?}"),
        }

        let state = h.session.state().await;
        assert_eq!(state.step, StepKey::ThankYou);
        assert_eq!(state.mode, FlowMode::Add);
        assert!(h.session.snapshot().await.company.name.is_empty());
        assert_eq!(h.api.submission_count(), 1);
    }

    #[tokio::test]
    async fn failed_check_keeps_documents_step() {
        let verifier = ScriptedVerifier::new();
        verifier.respond(DocumentKind::TaxId, RegistryStatus::Invalid);
        let h = harness_with(verifier, RecordingApi::ok());
        h.session
            .replace(unverified_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::DocumentDetails).await.unwrap();

        match h.session.next().await {
            NextOutcome::VerificationFailed { report } => {
                assert_eq!(report.failures().count(), 1)
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
        let state = h.session.state().await;
        assert_eq!(state.step, StepKey::DocumentDetails);
        assert!(!state.verifying);

        let snapshot = h.session.snapshot().await;
        let tax_id = snapshot.document(DocumentKind::TaxId).unwrap();
        assert_eq!(
            tax_id.error.as_deref(),
            Some("Tax ID does not match the declared name and date")
        );
        assert!(snapshot.document(DocumentKind::TaxRegistration).unwrap().verified);
    }

    #[tokio::test]
    async fn sole_proprietor_leftover_incorporation_does_not_block() {
        let verifier = ScriptedVerifier::new();
        verifier.respond(DocumentKind::Incorporation, RegistryStatus::Inactive);
        let h = harness_with(verifier, RecordingApi::ok());
        let mut snapshot = unverified_snapshot();
        snapshot.company.business_type = Some(BusinessType::SoleProprietorship);
        h.session
            .replace(snapshot, FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::DocumentDetails).await.unwrap();

        assert!(matches!(
            h.session.next().await,
            NextOutcome::Advanced {
                to: StepKey::PersonalDetails,
                ..
            }
        ));
        assert_eq!(h.verifier.call_count(), 2);
        let snapshot = h.session.snapshot().await;
        assert!(snapshot.document(DocumentKind::Incorporation).unwrap().error.is_none());
    }

    #[tokio::test]
    async fn second_next_while_verifying_is_busy() {
        let h = harness_with(
            ScriptedVerifier::with_delay(Duration::from_millis(200)),
            RecordingApi::ok(),
        );
        h.session
            .replace(unverified_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::DocumentDetails).await.unwrap();

        let session = h.session.clone();
        let first = tokio::spawn(async move { session.next().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.session.status().await.verifying);
        assert!(matches!(h.session.next().await, NextOutcome::Busy));

        let outcome = first.await.unwrap();
        assert!(matches!(
            outcome,
            NextOutcome::Advanced {
                to: StepKey::PersonalDetails,
                ..
            }
        ));
        assert_eq!(h.verifier.call_count(), 3);
    }

    #[tokio::test]
    async fn restart_during_verification_discards_results() {
        let h = harness_with(
            ScriptedVerifier::with_delay(Duration::from_millis(200)),
            RecordingApi::ok(),
        );
        h.session
            .replace(unverified_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::DocumentDetails).await.unwrap();

        let session = h.session.clone();
        let pending = tokio::spawn(async move { session.next().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.session.start_new().await;

        assert!(matches!(pending.await.unwrap(), NextOutcome::Stale));
        let snapshot = h.session.snapshot().await;
        assert!(snapshot.documents.iter().all(|d| !d.verified));
        assert_eq!(h.session.state().await.step, StepKey::CompanyDetails);
    }

    #[tokio::test]
    async fn editing_checked_values_drops_verification() {
        let h = harness();
        h.session
            .replace(complete_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;

        h.session
            .edit(|s| {
                s.document_mut(DocumentKind::TaxId).unwrap().number = "ZZZZZ9999Z".into();
                s.personal.phone = "9000000001".into();
                s.company.name = "Acme Retail".into();
            })
            .await
            .unwrap();

        let snapshot = h.session.snapshot().await;
        assert!(!snapshot.document(DocumentKind::TaxId).unwrap().verified);
        assert!(snapshot.document(DocumentKind::Incorporation).unwrap().verified);
        assert!(!snapshot.personal.phone_verified);
        assert!(snapshot.personal.email_verified);
    }

    #[tokio::test]
    async fn client_snapshot_cannot_forge_verification() {
        let h = harness();
        h.session.apply_client_snapshot(complete_snapshot()).await.unwrap();

        let snapshot = h.session.snapshot().await;
        assert!(snapshot.documents.iter().all(|d| !d.verified));
        assert!(!snapshot.personal.phone_verified && !snapshot.personal.email_verified);
        assert_eq!(snapshot.personal.password.expose(), "s3cret-Pass");

        let mut again = snapshot.clone();
        again.personal.password = Password::default();
        h.session.apply_client_snapshot(again).await.unwrap();
        assert_eq!(
            h.session.snapshot().await.personal.password.expose(),
            "s3cret-Pass"
        );
    }

    #[tokio::test]
    async fn view_mode_navigates_but_never_writes() {
        let h = harness();
        let target = SubmissionTarget::Update {
            company_id: "c-1".into(),
            location_id: "l-1".into(),
        };
        h.session
            .replace(unverified_snapshot(), FlowMode::View, target)
            .await;

        assert!(matches!(
            h.session.edit(|s| s.company.name.clear()).await,
            Err(Error::ReadOnly)
        ));
        assert!(matches!(
            h.session.next().await,
            NextOutcome::Advanced {
                to: StepKey::AddressDetails,
                ..
            }
        ));
        assert_eq!(
            h.session.go_to(StepKey::PersonalDetails).await,
            Ok(StepKey::PersonalDetails)
        );
        assert!(matches!(h.session.next().await, NextOutcome::NoFurtherStep));
        assert!(matches!(
            h.session.submit().await,
            Err(SubmissionError::ReadOnly)
        ));
        assert_eq!(h.verifier.call_count(), 0);
        assert_eq!(h.api.submission_count(), 0);
    }

    #[tokio::test]
    async fn blocked_jump_leaves_step_alone() {
        let h = harness();
        let mut events = h.session.subscribe();

        let err = h.session.go_to(StepKey::BrandDetails).await.unwrap_err();
        assert_eq!(err.message, "Please complete Company details before continuing");
        assert_eq!(h.session.state().await.step, StepKey::CompanyDetails);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn step_changes_are_broadcast() {
        let h = harness();
        h.session
            .replace(complete_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;
        let mut events = h.session.subscribe();

        h.session.go_to(StepKey::BrandDetails).await.unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::StepChanged {
                from: StepKey::CompanyDetails,
                to: StepKey::BrandDetails,
            }
        );
    }

    #[tokio::test]
    async fn rejected_submission_keeps_everything() {
        let h = harness_with(
            ScriptedVerifier::new(),
            RecordingApi::replying(ApiResponse {
                success: false,
                message: Some("Brand name already taken".into()),
                data: None,
            }),
        );
        h.session
            .replace(complete_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::PersonalDetails).await.unwrap();

        match h.session.next().await {
            NextOutcome::SubmissionFailed { message } => {
                assert_eq!(message, "Brand name already taken")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(h.session.state().await.step, StepKey::PersonalDetails);
        assert_eq!(h.session.snapshot().await, complete_snapshot());
    }

    #[tokio::test]
    async fn jumping_to_last_step_still_validates_every_step() {
        let h = harness();
        let mut snapshot = complete_snapshot();
        snapshot.company.email = "not-an-email".into();
        snapshot.brand.selling_platforms = vec![
            SellingPlatform::new("amazon", "https://amazon.in/s/a"),
            SellingPlatform::new("amazon", "https://amazon.in/s/b"),
        ];
        h.session
            .replace(snapshot, FlowMode::Add, SubmissionTarget::Create)
            .await;
        h.session.go_to(StepKey::PersonalDetails).await.unwrap();

        match h.session.next().await {
            NextOutcome::Invalid { errors } => {
                let fields: Vec<String> = errors.iter().map(|e| e.field.to_string()).collect();
                assert!(fields.contains(&"company.email".to_string()), "{fields:?}");
                assert!(
                    errors.iter().any(|e| e.message == "amazon is already listed"),
                    "{fields:?}"
                );
            }
            other => panic!("expected field errors, got {other:?}"),
        }
        assert!(matches!(
            h.session.submit().await,
            Err(SubmissionError::Invalid { .. })
        ));
        assert_eq!(h.session.state().await.step, StepKey::PersonalDetails);
        assert_eq!(h.api.submission_count(), 0);
    }

    #[tokio::test]
    async fn submit_is_refused_before_the_last_step() {
        let h = harness();
        h.session
            .replace(complete_snapshot(), FlowMode::Add, SubmissionTarget::Create)
            .await;

        match h.session.submit().await {
            Err(SubmissionError::StepNotReached { step }) => assert_eq!(step, "Personal details"),
            other => panic!("expected refusal, got {other:?}"),
        }
        assert_eq!(h.api.submission_count(), 0);

        h.session.go_to(StepKey::PersonalDetails).await.unwrap();
        assert!(h.session.submit().await.is_ok());
        assert_eq!(h.api.submission_count(), 1);
    }

    #[tokio::test]
    async fn otp_round_trip_marks_contact_verified() {
        let h = harness();
        let mut snapshot = complete_snapshot();
        snapshot.personal.phone_verified = false;
        h.session
            .replace(snapshot, FlowMode::Add, SubmissionTarget::Create)
            .await;

        h.session.send_otp(OtpChannel::Phone).await.unwrap();
        assert_eq!(
            h.otp.sent.lock().unwrap().as_slice(),
            &[(OtpChannel::Phone, "9123456780".to_string())]
        );

        assert!(matches!(
            h.session.verify_otp(OtpChannel::Phone, "000000").await,
            Err(OtpError::Rejected { .. })
        ));
        assert!(!h.session.snapshot().await.personal.phone_verified);

        h.session.verify_otp(OtpChannel::Phone, "123456").await.unwrap();
        assert!(h.session.snapshot().await.personal.phone_verified);
    }

    #[tokio::test]
    async fn otp_needs_a_contact() {
        let h = harness();
        assert!(matches!(
            h.session.send_otp(OtpChannel::Email).await,
            Err(OtpError::MissingTarget { .. })
        ));
    }

    #[tokio::test]
    async fn open_hydrates_saved_record_for_editing() {
        let record = OnboardingRecord {
            company_id: "c-1".into(),
            location_id: "l-1".into(),
            company_name: "Acme Retail Pvt Ltd".into(),
            owner_email: "asha@acme.example".into(),
            ..Default::default()
        };
        let h = harness_with(
            ScriptedVerifier::new(),
            RecordingApi {
                record: Some(record),
                ..RecordingApi::ok()
            },
        );

        h.session.open("c-1", "l-1", false).await.unwrap();
        let state = h.session.state().await;
        assert_eq!(state.mode, FlowMode::Edit);
        assert_eq!(
            h.session.target().await,
            SubmissionTarget::Update {
                company_id: "c-1".into(),
                location_id: "l-1".into(),
            }
        );
        assert_eq!(h.session.snapshot().await.company.name, "Acme Retail Pvt Ltd");
    }

    #[tokio::test]
    async fn failed_load_falls_back_to_new_onboarding() {
        let h = harness();
        assert!(h.session.open("c-9", "l-9", true).await.is_err());
        assert_eq!(h.session.state().await.mode, FlowMode::Add);
        assert_eq!(h.session.target().await, SubmissionTarget::Create);
    }
}
