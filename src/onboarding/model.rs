//! Onboarding form snapshot and its parts.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Legal structure of the onboarding company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    SoleProprietorship,
    Partnership,
    PrivateLimited,
    PublicLimited,
    Llp,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SoleProprietorship => "sole_proprietorship",
            Self::Partnership => "partnership",
            Self::PrivateLimited => "private_limited",
            Self::PublicLimited => "public_limited",
            Self::Llp => "llp",
        }
    }

    /// Sole proprietors have no incorporation certificate.
    pub fn is_incorporated(&self) -> bool {
        !matches!(self, Self::SoleProprietorship)
    }
}

impl std::str::FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sole_proprietorship" => Ok(Self::SoleProprietorship),
            "partnership" => Ok(Self::Partnership),
            "private_limited" => Ok(Self::PrivateLimited),
            "public_limited" => Ok(Self::PublicLimited),
            "llp" => Ok(Self::Llp),
            other => Err(format!("unknown business type: {other}")),
        }
    }
}

/// A file attached to the form: either freshly uploaded bytes or a URL from a
/// prior save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FileRef {
    Upload {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    Url {
        url: String,
    },
}

impl FileRef {
    pub fn upload(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self::Upload {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// An upload with no bytes or a blank URL counts as nothing attached.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Upload { bytes, .. } => bytes.is_empty(),
            Self::Url { url } => url.trim().is_empty(),
        }
    }
}

/// Company identity captured on the first step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub name: String,
    pub business_type: Option<BusinessType>,
    pub establishment_date: Option<NaiveDate>,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub is_subsidiary: bool,
    /// Only meaningful when `is_subsidiary` is set.
    #[serde(default)]
    pub headquarter_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<FileRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Registered,
    Office,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Office => "office",
        }
    }
}

/// One entry in the company's address list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// External identifier when loaded from a prior save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub address_type: Option<AddressType>,
    pub line: String,
    pub landmark: String,
    pub phone: String,
    pub country_code: String,
    pub state_code: String,
    pub city_code: String,
    pub postal_code: String,
}

impl Address {
    pub fn with_type(address_type: AddressType) -> Self {
        Self {
            address_type: Some(address_type),
            ..Default::default()
        }
    }

    pub fn is_registered(&self) -> bool {
        self.address_type == Some(AddressType::Registered)
    }
}

/// Registration documents the wizard knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Incorporation,
    TaxId,
    TaxRegistration,
    MicroEnterpriseRegistration,
    FoodLicense,
    DrugLicense,
    BrandAuthorization,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 7] = [
        DocumentKind::Incorporation,
        DocumentKind::TaxId,
        DocumentKind::TaxRegistration,
        DocumentKind::MicroEnterpriseRegistration,
        DocumentKind::FoodLicense,
        DocumentKind::DrugLicense,
        DocumentKind::BrandAuthorization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incorporation => "incorporation",
            Self::TaxId => "tax_id",
            Self::TaxRegistration => "tax_registration",
            Self::MicroEnterpriseRegistration => "micro_enterprise_registration",
            Self::FoodLicense => "food_license",
            Self::DrugLicense => "drug_license",
            Self::BrandAuthorization => "brand_authorization",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Incorporation => "Company incorporation number",
            Self::TaxId => "Tax ID",
            Self::TaxRegistration => "Tax registration number",
            Self::MicroEnterpriseRegistration => "Micro-enterprise registration",
            Self::FoodLicense => "Food license",
            Self::DrugLicense => "Drug license",
            Self::BrandAuthorization => "Brand authorization letter",
        }
    }

    /// Kinds that carry only an uploaded file, never a declared number.
    pub fn is_upload_only(&self) -> bool {
        matches!(self, Self::BrandAuthorization)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown document kind: {s}"))
    }
}

/// Which document kinds must pass an external registry check before they
/// count as verified. Kinds outside the set start out verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    kinds: HashSet<DocumentKind>,
}

impl VerificationPolicy {
    pub fn new(kinds: impl IntoIterator<Item = DocumentKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A policy under which nothing needs a registry check.
    pub fn none() -> Self {
        Self::new([])
    }

    pub fn requires_verification(&self, kind: DocumentKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DocumentKind> + '_ {
        let mut kinds: Vec<_> = self.kinds.iter().copied().collect();
        kinds.sort();
        kinds.into_iter()
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::new([
            DocumentKind::Incorporation,
            DocumentKind::TaxId,
            DocumentKind::TaxRegistration,
        ])
    }
}

/// A registration document entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocumentKind,
    /// Declared number. Always empty for upload-only kinds.
    #[serde(default)]
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub verified: bool,
    /// Verification error attached to the number field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Document {
    pub fn new(kind: DocumentKind, policy: &VerificationPolicy) -> Self {
        Self {
            kind,
            number: String::new(),
            file: None,
            verified: !policy.requires_verification(kind),
            error: None,
        }
    }

    pub fn has_number(&self) -> bool {
        !self.number.trim().is_empty()
    }

    pub fn has_file(&self) -> bool {
        self.file.as_ref().is_some_and(|f| !f.is_empty())
    }
}

/// A marketplace the brand already sells on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellingPlatform {
    pub platform: String,
    pub url: String,
}

impl SellingPlatform {
    /// The catch-all platform value, which may repeat.
    pub const OTHER: &'static str = "other";

    pub fn new(platform: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub linkedin: String,
}

/// Brand identity and commercial figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub selling_platforms: Vec<SellingPlatform>,
    #[serde(default)]
    pub social: SocialLinks,
    pub total_skus: Option<u32>,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub average_selling_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub marketing_budget: Option<Decimal>,
}

impl Brand {
    /// Platform values listed more than once, ignoring the catch-all.
    ///
    /// Returns `(index, platform)` for every repeat after the first
    /// occurrence, so callers can flag the offending rows.
    pub fn duplicate_platforms(&self) -> Vec<(usize, String)> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for (i, entry) in self.selling_platforms.iter().enumerate() {
            let key = entry.platform.trim().to_lowercase();
            if key.is_empty() || key == SellingPlatform::OTHER {
                continue;
            }
            if !seen.insert(key.clone()) {
                dups.push((i, key));
            }
        }
        dups
    }
}

/// Write-only password. Never serialized back out, never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Owner / primary contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personal {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub designation: String,
    #[serde(default, skip_serializing)]
    pub password: Password,
    /// Set only by a successful OTP round trip.
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub email_verified: bool,
}

/// The complete in-memory onboarding form state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub company: CompanyDetails,
    pub addresses: Vec<Address>,
    pub brand: Brand,
    pub documents: Vec<Document>,
    pub personal: Personal,
    #[serde(default)]
    pub accepted_terms: bool,
}

impl FormSnapshot {
    /// A blank snapshot for a new onboarding: one registered address row and
    /// the documents every business needs.
    pub fn fresh(policy: &VerificationPolicy) -> Self {
        Self {
            company: CompanyDetails::default(),
            addresses: vec![Address::with_type(AddressType::Registered)],
            brand: Brand::default(),
            documents: [
                DocumentKind::Incorporation,
                DocumentKind::TaxId,
                DocumentKind::TaxRegistration,
            ]
            .into_iter()
            .map(|kind| Document::new(kind, policy))
            .collect(),
            personal: Personal::default(),
            accepted_terms: false,
        }
    }

    pub fn document(&self, kind: DocumentKind) -> Option<&Document> {
        self.documents.iter().find(|d| d.kind == kind)
    }

    pub fn document_mut(&mut self, kind: DocumentKind) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.kind == kind)
    }

    /// Get the entry for `kind`, adding a blank one if missing.
    pub fn ensure_document(
        &mut self,
        kind: DocumentKind,
        policy: &VerificationPolicy,
    ) -> &mut Document {
        let pos = match self.documents.iter().position(|d| d.kind == kind) {
            Some(pos) => pos,
            None => {
                self.documents.push(Document::new(kind, policy));
                self.documents.len() - 1
            }
        };
        &mut self.documents[pos]
    }

    /// Change a document's declared number.
    ///
    /// A changed number invalidates any previous verification for kinds that
    /// need a registry check, and clears the stale error either way.
    pub fn set_document_number(
        &mut self,
        kind: DocumentKind,
        number: impl Into<String>,
        policy: &VerificationPolicy,
    ) {
        let number = number.into();
        let doc = self.ensure_document(kind, policy);
        if doc.number == number {
            return;
        }
        doc.number = number;
        doc.error = None;
        if policy.requires_verification(kind) {
            doc.verified = false;
        }
    }

    /// Change the owner's phone. Any previous OTP verification is dropped.
    pub fn set_owner_phone(&mut self, phone: impl Into<String>) {
        let phone = phone.into();
        if self.personal.phone != phone {
            self.personal.phone = phone;
            self.personal.phone_verified = false;
        }
    }

    /// Change the owner's email. Any previous OTP verification is dropped.
    pub fn set_owner_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        if self.personal.email != email {
            self.personal.email = email;
            self.personal.email_verified = false;
        }
    }

    pub fn registered_address_count(&self) -> usize {
        self.addresses.iter().filter(|a| a.is_registered()).count()
    }

    /// Address types still selectable for row `index`: once another row is
    /// registered, only "office" remains.
    pub fn address_types_available(&self, index: usize) -> Vec<AddressType> {
        let other_registered = self
            .addresses
            .iter()
            .enumerate()
            .any(|(i, a)| i != index && a.is_registered());
        if other_registered {
            vec![AddressType::Office]
        } else {
            vec![AddressType::Registered, AddressType::Office]
        }
    }
}

impl Default for FormSnapshot {
    fn default() -> Self {
        Self::fresh(&VerificationPolicy::default())
    }
}
