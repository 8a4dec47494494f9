//! Document verification orchestrator.
//!
//! When the user leaves the documents step, every document that has a number
//! but is not yet verified is checked against its external registry. All
//! checks run concurrently and all of them settle before a decision is made.
//! Documents already marked verified are never re-sent, so revisiting the
//! step does not re-query (or re-bill) the registries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::model::{DocumentKind, FormSnapshot, VerificationPolicy};
use super::registry::document_kinds_required;
use crate::error::ApiError;

/// Status reported by a registry for a declared number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStatus {
    Active,
    Inactive,
    Valid,
    Invalid,
    Other(String),
}

impl RegistryStatus {
    /// Parse a registry's free-form status string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "inactive" | "cancelled" | "suspended" | "struck off" => Self::Inactive,
            "valid" | "verified" => Self::Valid,
            "invalid" => Self::Invalid,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// The boolean the orchestrator cares about.
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Active | Self::Valid)
    }
}

/// One registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum VerificationRequest {
    /// Company registry lookup.
    Incorporation {
        number: String,
        name_as_declared: String,
        establishment_date: NaiveDate,
    },
    /// Tax authority lookup.
    TaxRegistration { registration_id: String },
    /// Tax identity lookup.
    TaxId {
        id: String,
        name_as_declared: String,
        date_of_birth: NaiveDate,
    },
}

impl VerificationRequest {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Incorporation { .. } => DocumentKind::Incorporation,
            Self::TaxRegistration { .. } => DocumentKind::TaxRegistration,
            Self::TaxId { .. } => DocumentKind::TaxId,
        }
    }

    pub fn number(&self) -> &str {
        match self {
            Self::Incorporation { number, .. } => number,
            Self::TaxRegistration { registration_id } => registration_id,
            Self::TaxId { id, .. } => id,
        }
    }
}

/// External registries that can confirm a declared number.
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<RegistryStatus, ApiError>;
}

/// Result of checking a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckResult {
    Verified,
    /// Registry answered, but not with an active/valid status.
    Rejected { message: String },
    /// The call itself failed.
    Failed { message: String },
    /// Could not be checked at all (no registry, missing inputs).
    Unavailable { message: String },
}

impl CheckResult {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Verified => None,
            Self::Rejected { message }
            | Self::Failed { message }
            | Self::Unavailable { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    pub kind: DocumentKind,
    /// The number that was checked. Results are only applied if the
    /// document still carries this number.
    pub number: String,
    #[serde(flatten)]
    pub result: CheckResult,
}

/// Everything a verification pass found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub outcomes: Vec<DocumentOutcome>,
    /// Number of registry calls actually issued.
    pub calls_made: usize,
}

impl VerificationReport {
    /// Advancing is allowed only if every checked document came back good.
    pub fn may_advance(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.result == CheckResult::Verified)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.result != CheckResult::Verified)
    }

    /// Write outcomes back onto the snapshot.
    ///
    /// Passing documents become verified with their error cleared; failing
    /// ones keep `verified = false` and get the error attached. Documents not
    /// in the report, or whose number has changed since the check was
    /// dispatched, are left untouched. Returns the number of documents
    /// updated.
    pub fn apply(&self, snapshot: &mut FormSnapshot) -> usize {
        let mut applied = 0;
        for outcome in &self.outcomes {
            let Some(doc) = snapshot.document_mut(outcome.kind) else {
                continue;
            };
            if doc.number != outcome.number {
                debug!(
                    kind = %outcome.kind,
                    "Document number changed during verification; dropping result"
                );
                continue;
            }
            match &outcome.result {
                CheckResult::Verified => {
                    doc.verified = true;
                    doc.error = None;
                }
                other => {
                    doc.verified = false;
                    doc.error = other.message().map(str::to_string);
                }
            }
            applied += 1;
        }
        applied
    }
}

fn rejected_message(kind: DocumentKind, status: &RegistryStatus) -> String {
    match kind {
        DocumentKind::Incorporation => {
            "Company incorporation number is not active in the company registry".to_string()
        }
        DocumentKind::TaxRegistration => {
            "Tax registration number is not active with the tax authority".to_string()
        }
        DocumentKind::TaxId => {
            "Tax ID does not match the declared name and date".to_string()
        }
        other => format!("{} was not accepted ({status:?})", other.label()),
    }
}

fn failed_message(kind: DocumentKind) -> String {
    format!("Could not verify {} right now. Please try again.", kind.label())
}

/// Issues the registry calls and folds their results into a report.
pub struct VerificationOrchestrator {
    verifier: Arc<dyn DocumentVerifier>,
    policy: VerificationPolicy,
}

impl VerificationOrchestrator {
    pub fn new(verifier: Arc<dyn DocumentVerifier>, policy: VerificationPolicy) -> Self {
        Self { verifier, policy }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Split the documents that need checking into dispatchable requests and
    /// outcomes decided without a call.
    ///
    /// Only documents the business must provide, with a number, not yet
    /// verified, and whose kind the policy says needs verification are
    /// considered. A kind with no registry to ask is reported unavailable.
    pub fn plan(
        &self,
        snapshot: &FormSnapshot,
    ) -> (Vec<VerificationRequest>, Vec<DocumentOutcome>) {
        let required = document_kinds_required(snapshot);
        let mut requests = Vec::new();
        let mut undecidable = Vec::new();

        for doc in &snapshot.documents {
            if doc.verified
                || !doc.has_number()
                || !required.contains(&doc.kind)
                || !self.policy.requires_verification(doc.kind)
            {
                continue;
            }
            let number = doc.number.trim().to_string();
            let unavailable = |message: String| DocumentOutcome {
                kind: doc.kind,
                number: doc.number.clone(),
                result: CheckResult::Unavailable { message },
            };

            let establishment_date = snapshot.company.establishment_date;
            let request = match doc.kind {
                DocumentKind::Incorporation => establishment_date.map(|date| {
                    VerificationRequest::Incorporation {
                        number,
                        name_as_declared: snapshot.company.name.trim().to_string(),
                        establishment_date: date,
                    }
                }),
                DocumentKind::TaxId => establishment_date.map(|date| VerificationRequest::TaxId {
                    id: number,
                    name_as_declared: snapshot.personal.name.trim().to_string(),
                    date_of_birth: date,
                }),
                DocumentKind::TaxRegistration => {
                    Some(VerificationRequest::TaxRegistration {
                        registration_id: number,
                    })
                }
                kind => {
                    undecidable.push(unavailable(format!(
                        "Verification is not available for {}",
                        kind.label()
                    )));
                    continue;
                }
            };

            match request {
                Some(request) => requests.push(request),
                None => undecidable.push(unavailable(format!(
                    "Establishment date is required to verify {}",
                    doc.kind.label()
                ))),
            }
        }
        (requests, undecidable)
    }

    /// Check every pending document concurrently and wait for all of them.
    pub async fn run(&self, snapshot: &FormSnapshot) -> VerificationReport {
        let (requests, mut outcomes) = self.plan(snapshot);
        if requests.is_empty() && outcomes.is_empty() {
            debug!("All documents already verified; no registry calls needed");
            return VerificationReport::default();
        }

        info!(
            calls = requests.len(),
            "Dispatching document verification"
        );

        let futures: Vec<_> = requests
            .iter()
            .map(|request| {
                let verifier = Arc::clone(&self.verifier);
                async move {
                    let kind = request.kind();
                    let number = snapshot
                        .document(kind)
                        .map(|d| d.number.clone())
                        .unwrap_or_default();
                    let result = match verifier.verify(request).await {
                        Ok(status) if status.is_good() => CheckResult::Verified,
                        Ok(status) => {
                            info!(kind = %kind, status = ?status, "Registry rejected document");
                            CheckResult::Rejected {
                                message: rejected_message(kind, &status),
                            }
                        }
                        Err(e) => {
                            warn!(kind = %kind, error = %e, "Document verification call failed");
                            CheckResult::Failed {
                                message: failed_message(kind),
                            }
                        }
                    };
                    DocumentOutcome {
                        kind,
                        number,
                        result,
                    }
                }
            })
            .collect();

        let calls_made = futures.len();
        outcomes.extend(join_all(futures).await);

        let report = VerificationReport {
            outcomes,
            calls_made,
        };
        info!(
            calls = calls_made,
            may_advance = report.may_advance(),
            failures = report.failures().count(),
            "Document verification settled"
        );
        report
    }
}
