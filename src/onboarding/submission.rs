//! Submission coordinator — packages the whole snapshot into one request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::evaluator::first_strictly_incomplete_step;
use super::model::{FileRef, FormSnapshot};
use super::record::OnboardingRecord;
use super::registry::document_kinds_required;
use super::state::FlowMode;
use super::validation::validate_all;
use crate::error::{ApiError, SubmissionError};

/// One multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Flat, ordered multipart body in wire field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPayload {
    fields: Vec<(String, PayloadValue)>,
}

impl SubmissionPayload {
    fn text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), PayloadValue::Text(value.into())));
    }

    /// Embed an uploaded file under `key`, or send a previously stored URL
    /// under `url_key`.
    fn file(&mut self, key: impl Into<String>, url_key: impl Into<String>, file: &FileRef) {
        match file {
            FileRef::Upload {
                file_name,
                content_type,
                bytes,
            } => self.fields.push((
                key.into(),
                PayloadValue::File {
                    file_name: file_name.clone(),
                    content_type: content_type.clone(),
                    bytes: bytes.clone(),
                },
            )),
            FileRef::Url { url } => self.text(url_key, url.clone()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value under `key`, if present and textual.
    pub fn text_value(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PayloadValue::Text(s) => Some(s),
            PayloadValue::File { .. } => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn from_fields(fields: Vec<(String, PayloadValue)>) -> Self {
        Self { fields }
    }

    pub fn into_fields(self) -> Vec<(String, PayloadValue)> {
        self.fields
    }
}

fn json_text<T: Serialize>(value: &T) -> String {
    // Plain strings and maps of strings cannot fail to serialize.
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

/// Remap the snapshot to the wire schema.
///
/// Pure. The password is only sent when non-empty; incorporation documents
/// are dropped for businesses that do not need them; files are embedded
/// rather than uploaded separately.
pub fn build_submission(snapshot: &FormSnapshot, mode: FlowMode) -> SubmissionPayload {
    let mut p = SubmissionPayload::default();

    let c = &snapshot.company;
    p.text("companyName", c.name.trim());
    if let Some(t) = c.business_type {
        p.text("businessType", t.as_str());
    }
    if let Some(d) = c.establishment_date {
        p.text("establishmentDate", d.format("%Y-%m-%d").to_string());
    }
    p.text("companyEmail", c.email.trim());
    p.text("companyPhone", c.phone.trim());
    if !c.website.trim().is_empty() {
        p.text("website", c.website.trim());
    }
    p.text("isSubsidiary", c.is_subsidiary.to_string());
    if c.is_subsidiary {
        p.text("headquarterLocation", c.headquarter_location.trim());
    }
    if let Some(logo) = c.logo.as_ref().filter(|l| !l.is_empty()) {
        p.file("logo", "logoUrl", logo);
    }

    for (i, a) in snapshot.addresses.iter().enumerate() {
        let key = |name: &str| format!("addresses[{i}][{name}]");
        if let Some(id) = &a.id {
            p.text(key("id"), id.clone());
        }
        if let Some(t) = a.address_type {
            p.text(key("addressType"), t.as_str());
        }
        p.text(key("addressLine"), a.line.trim());
        p.text(key("landmark"), a.landmark.trim());
        p.text(key("phone"), a.phone.trim());
        p.text(key("countryCode"), a.country_code.trim());
        p.text(key("stateCode"), a.state_code.trim());
        p.text(key("cityCode"), a.city_code.trim());
        p.text(key("postalCode"), a.postal_code.trim());
    }

    let b = &snapshot.brand;
    p.text("brandName", b.name.trim());
    let tags: Vec<&str> = b
        .category_tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    p.text("categoryTags", json_text(&tags));
    p.text("sellingPlatforms", json_text(&b.selling_platforms));
    p.text("socialLinks", json_text(&b.social));
    if let Some(n) = b.total_skus {
        p.text("totalSkus", n.to_string());
    }
    if let Some(d) = b.average_selling_price {
        p.text("averageSellingPrice", d.to_string());
    }
    if let Some(d) = b.marketing_budget {
        p.text("marketingBudget", d.to_string());
    }

    let kinds = document_kinds_required(snapshot);
    let docs = snapshot
        .documents
        .iter()
        .filter(|d| kinds.contains(&d.kind));
    for (i, d) in docs.enumerate() {
        let key = |name: &str| format!("documents[{i}][{name}]");
        p.text(key("documentType"), d.kind.as_str());
        if d.has_number() {
            p.text(key("documentNumber"), d.number.trim());
        }
        if let Some(file) = d.file.as_ref().filter(|f| !f.is_empty()) {
            p.file(key("document"), key("documentUrl"), file);
        }
        p.text(key("verified"), d.verified.to_string());
    }

    let o = &snapshot.personal;
    p.text("ownerName", o.name.trim());
    p.text("ownerEmail", o.email.trim());
    p.text("ownerPhone", o.phone.trim());
    p.text("designation", o.designation.trim());
    if mode == FlowMode::Add && !o.password.is_empty() {
        p.text("password", o.password.expose());
    }
    p.text("phoneVerified", o.phone_verified.to_string());
    p.text("emailVerified", o.email_verified.to_string());
    p.text("acceptedTerms", snapshot.accepted_terms.to_string());

    p
}

/// Where a submission goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionTarget {
    /// `POST /onboarding`
    Create,
    /// `PUT /onboarding/{company_id}/{location_id}`
    Update {
        company_id: String,
        location_id: String,
    },
}

impl SubmissionTarget {
    pub fn path(&self) -> String {
        match self {
            Self::Create => "/onboarding".to_string(),
            Self::Update {
                company_id,
                location_id,
            } => format!("/onboarding/{company_id}/{location_id}"),
        }
    }
}

/// Envelope every back-office response uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The back-office onboarding endpoints.
#[async_trait]
pub trait OnboardingApi: Send + Sync {
    async fn submit(
        &self,
        target: &SubmissionTarget,
        payload: SubmissionPayload,
    ) -> Result<ApiResponse, ApiError>;

    /// Load a saved onboarding for editing or viewing.
    async fn fetch(&self, company_id: &str, location_id: &str)
    -> Result<OnboardingRecord, ApiError>;
}

/// Identifiers returned by a successful submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub company_id: Option<String>,
    pub location_id: Option<String>,
    pub message: Option<String>,
}

impl SubmissionReceipt {
    fn from_response(response: &ApiResponse) -> Self {
        let field = |names: &[&str]| {
            let data = response.data.as_ref()?;
            names.iter().find_map(|n| match data.get(*n)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        Self {
            company_id: field(&["companyId", "id"]),
            location_id: field(&["locationId"]),
            message: response.message.clone(),
        }
    }
}

pub struct SubmissionCoordinator {
    api: Arc<dyn OnboardingApi>,
}

impl SubmissionCoordinator {
    pub fn new(api: Arc<dyn OnboardingApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn OnboardingApi> {
        &self.api
    }

    /// Submit the snapshot once. Never retries.
    ///
    /// Refuses without calling out if the flow is read-only or any step is
    /// not strictly complete. A rejection carries the server's message
    /// verbatim, or a generic one when the server gave none.
    pub async fn submit(
        &self,
        snapshot: &FormSnapshot,
        mode: FlowMode,
        target: &SubmissionTarget,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if mode == FlowMode::View {
            return Err(SubmissionError::ReadOnly);
        }
        if let Some(step) = first_strictly_incomplete_step(snapshot, mode) {
            return Err(SubmissionError::Incomplete(format!(
                "Please complete {} before submitting",
                step.label()
            )));
        }
        let errors = validate_all(snapshot, mode);
        if !errors.is_empty() {
            debug!(errors = errors.len(), "Submission refused with field errors");
            return Err(SubmissionError::Invalid { errors });
        }

        let payload = build_submission(snapshot, mode);
        info!(target = %target.path(), fields = payload.len(), "Submitting onboarding");

        let response = self
            .api
            .submit(target, payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "Onboarding submission failed in transport");
                SubmissionError::Transport(e)
            })?;

        if !response.success {
            let message = response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| SubmissionError::GENERIC_MESSAGE.to_string());
            warn!(message = %message, "Onboarding submission rejected");
            return Err(SubmissionError::Rejected { message });
        }

        let receipt = SubmissionReceipt::from_response(&response);
        info!(company_id = ?receipt.company_id, "Onboarding submitted");
        Ok(receipt)
    }
}
