//! Onboarding wizard for marketplace sellers.
//!
//! A seller fills five steps (company, addresses, brand, documents, owner)
//! and submits them as one record. Completion is always recomputed from the
//! current snapshot; the guard consults it before honoring a step change,
//! "Next" out of the documents step waits for registry checks, and the
//! coordinator turns the final snapshot into a single multipart request.

pub mod evaluator;
pub mod guard;
pub mod model;
pub mod otp;
pub mod record;
pub mod registry;
pub mod routes;
pub mod session;
pub mod state;
pub mod submission;
pub mod validation;
pub mod verification;

pub use evaluator::{are_all_steps_completed, compute_first_incomplete_step, is_step_complete};
pub use guard::{NavigationBlocked, can_access_step, request_step};
pub use model::{DocumentKind, FormSnapshot, VerificationPolicy};
pub use otp::{OtpChannel, OtpService};
pub use registry::{FieldId, Strictness, fields_for_step, required_fields};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::{NextOutcome, SessionEvent, SessionStatus, WizardSession};
pub use state::{FlowMode, StepKey};
pub use submission::{
    OnboardingApi, SubmissionCoordinator, SubmissionPayload, SubmissionTarget, build_submission,
};
pub use verification::{DocumentVerifier, VerificationOrchestrator, VerificationReport};
