//! Wizard step ordering and per-session navigation state.

use serde::{Deserialize, Serialize};

/// The steps of the onboarding wizard.
///
/// Totally ordered: CompanyDetails → AddressDetails → BrandDetails →
/// DocumentDetails → PersonalDetails → ThankYou. The order never changes at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    CompanyDetails,
    AddressDetails,
    BrandDetails,
    DocumentDetails,
    PersonalDetails,
    ThankYou,
}

impl StepKey {
    /// Every step in wizard order.
    pub const ALL: [StepKey; 6] = [
        StepKey::CompanyDetails,
        StepKey::AddressDetails,
        StepKey::BrandDetails,
        StepKey::DocumentDetails,
        StepKey::PersonalDetails,
        StepKey::ThankYou,
    ];

    /// The steps that own form fields (everything but the terminal step).
    pub const FORM_STEPS: [StepKey; 5] = [
        StepKey::CompanyDetails,
        StepKey::AddressDetails,
        StepKey::BrandDetails,
        StepKey::DocumentDetails,
        StepKey::PersonalDetails,
    ];

    pub fn first() -> StepKey {
        StepKey::CompanyDetails
    }

    /// Position in the fixed order.
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(Self::ALL.len() - 1)
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ThankYou)
    }

    /// The last step that carries form fields.
    pub fn is_last_form_step(&self) -> bool {
        matches!(self, Self::PersonalDetails)
    }

    /// Get the next step in order, if any.
    pub fn next(&self) -> Option<StepKey> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Get the previous step in order, if any.
    pub fn previous(&self) -> Option<StepKey> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Steps strictly before this one.
    pub fn predecessors(&self) -> &'static [StepKey] {
        &Self::ALL[..self.index()]
    }

    /// Human-readable name used in navigation messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CompanyDetails => "Company details",
            Self::AddressDetails => "Address details",
            Self::BrandDetails => "Brand details",
            Self::DocumentDetails => "Document details",
            Self::PersonalDetails => "Personal details",
            Self::ThankYou => "Thank you",
        }
    }
}

impl Default for StepKey {
    fn default() -> Self {
        Self::CompanyDetails
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CompanyDetails => "company_details",
            Self::AddressDetails => "address_details",
            Self::BrandDetails => "brand_details",
            Self::DocumentDetails => "document_details",
            Self::PersonalDetails => "personal_details",
            Self::ThankYou => "thank_you",
        };
        write!(f, "{s}")
    }
}

/// Which kind of onboarding session this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    /// A brand-new onboarding.
    Add,
    /// Updating a previously submitted onboarding.
    Edit,
    /// Read-only view of a previously submitted onboarding.
    View,
}

impl Default for FlowMode {
    fn default() -> Self {
        Self::Add
    }
}

impl std::fmt::Display for FlowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Edit => write!(f, "edit"),
            Self::View => write!(f, "view"),
        }
    }
}

/// Navigation bookkeeping for one wizard session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardState {
    /// Currently visible step.
    pub step: StepKey,
    pub mode: FlowMode,
    /// Bumped whenever the snapshot is replaced wholesale (load, reset,
    /// successful submission). Async results dispatched under an older
    /// generation are discarded.
    pub generation: u64,
    /// Bumped on every field-level edit.
    pub revision: u64,
    /// True while the document verification fan-out is in flight.
    pub verifying: bool,
}

impl WizardState {
    pub fn new(mode: FlowMode) -> Self {
        Self {
            step: StepKey::first(),
            mode,
            generation: 0,
            revision: 0,
            verifying: false,
        }
    }

    /// Move to `step`. Returns the step that was left.
    pub fn move_to(&mut self, step: StepKey) -> StepKey {
        std::mem::replace(&mut self.step, step)
    }

    /// Start over with a fresh snapshot owner.
    pub fn restart(&mut self, mode: FlowMode) {
        self.step = StepKey::first();
        self.mode = mode;
        self.generation += 1;
        self.revision = 0;
        self.verifying = false;
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(FlowMode::default())
    }
}
