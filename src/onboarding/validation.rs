//! Field-level validation for a single step.
//!
//! Runs on an explicit "Next" and only over the fields the registry lists for
//! the current step. Errors are synchronous and go away as soon as the input
//! is corrected.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use super::evaluator::is_filled;
use super::model::FormSnapshot;
use super::registry::{
    self, AddressField, BrandField, CompanyField, DocumentField, FieldId, PersonalField,
    PlatformField, Requirement, Strictness,
};
use super::state::{FlowMode, StepKey};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").unwrap());
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,13}$").unwrap());
static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 -]{2,9}$").unwrap());
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*\.[^\s]+$").unwrap());

const MIN_PASSWORD_LEN: usize = 8;

/// A validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FieldId,
    pub message: String,
}

impl FieldError {
    fn new(field: FieldId, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Human-readable name of a field.
pub fn field_label(field: &FieldId) -> String {
    match field {
        FieldId::Company(f) => match f {
            CompanyField::Name => "Company name",
            CompanyField::BusinessType => "Business type",
            CompanyField::EstablishmentDate => "Establishment date",
            CompanyField::Email => "Company email",
            CompanyField::Phone => "Company phone",
            CompanyField::Website => "Company website",
            CompanyField::HeadquarterLocation => "Headquarter location",
            CompanyField::Logo => "Company logo",
        }
        .to_string(),
        FieldId::Addresses => "Addresses".to_string(),
        FieldId::Address { field, .. } => match field {
            AddressField::Type => "Address type",
            AddressField::Line => "Address",
            AddressField::Landmark => "Landmark",
            AddressField::Phone => "Phone",
            AddressField::Country => "Country",
            AddressField::State => "State",
            AddressField::City => "City",
            AddressField::PostalCode => "Postal code",
        }
        .to_string(),
        FieldId::Brand(f) => match f {
            BrandField::Name => "Brand name",
            BrandField::TotalSkus => "Total SKUs",
            BrandField::CategoryTags => "Category",
            BrandField::AverageSellingPrice => "Average selling price",
            BrandField::MarketingBudget => "Marketing budget",
            BrandField::Website => "Website",
            BrandField::Instagram => "Instagram",
            BrandField::Facebook => "Facebook",
            BrandField::Linkedin => "LinkedIn",
        }
        .to_string(),
        FieldId::SellingPlatform { field, .. } => match field {
            PlatformField::Platform => "Platform",
            PlatformField::Url => "Store URL",
        }
        .to_string(),
        FieldId::Document { kind, field } => match field {
            DocumentField::Number => kind.label().to_string(),
            DocumentField::File => format!("{} upload", kind.label()),
        },
        FieldId::Personal(f) => match f {
            PersonalField::Name => "Name",
            PersonalField::Email => "Email",
            PersonalField::Phone => "Phone number",
            PersonalField::Designation => "Designation",
            PersonalField::Password => "Password",
        }
        .to_string(),
    }
}

fn check_format(snapshot: &FormSnapshot, field: &FieldId) -> Option<String> {
    let bad_url = |s: &str| (!URL.is_match(s.trim())).then(|| "Enter a valid URL".to_string());
    let bad_email =
        |s: &str| (!EMAIL.is_match(s.trim())).then(|| "Enter a valid email address".to_string());
    let bad_phone =
        |s: &str| (!PHONE.is_match(s.trim())).then(|| "Enter a valid phone number".to_string());
    let negative = |d: Option<Decimal>| {
        d.is_some_and(|d| d.is_sign_negative())
            .then(|| "Amount cannot be negative".to_string())
    };

    match *field {
        FieldId::Company(f) => {
            let c = &snapshot.company;
            match f {
                CompanyField::Email => bad_email(&c.email),
                CompanyField::Phone => bad_phone(&c.phone),
                CompanyField::Website => bad_url(&c.website),
                CompanyField::EstablishmentDate => c
                    .establishment_date
                    .filter(|d| *d > Utc::now().date_naive())
                    .map(|_| "Establishment date cannot be in the future".to_string()),
                _ => None,
            }
        }
        FieldId::Address { index, field } => {
            let a = snapshot.addresses.get(index)?;
            match field {
                AddressField::Phone => bad_phone(&a.phone),
                AddressField::PostalCode => (!POSTAL_CODE.is_match(a.postal_code.trim()))
                    .then(|| "Enter a valid postal code".to_string()),
                _ => None,
            }
        }
        FieldId::Brand(f) => {
            let b = &snapshot.brand;
            match f {
                BrandField::TotalSkus => (b.total_skus == Some(0))
                    .then(|| "Total SKUs must be at least 1".to_string()),
                BrandField::AverageSellingPrice => negative(b.average_selling_price),
                BrandField::MarketingBudget => negative(b.marketing_budget),
                BrandField::Website => bad_url(&b.social.website),
                BrandField::Instagram => bad_url(&b.social.instagram),
                BrandField::Facebook => bad_url(&b.social.facebook),
                BrandField::Linkedin => bad_url(&b.social.linkedin),
                _ => None,
            }
        }
        FieldId::SellingPlatform {
            index,
            field: PlatformField::Url,
        } => bad_url(&snapshot.brand.selling_platforms.get(index)?.url),
        FieldId::Personal(f) => {
            let p = &snapshot.personal;
            match f {
                PersonalField::Email => bad_email(&p.email),
                PersonalField::Phone => bad_phone(&p.phone),
                PersonalField::Password => (p.password.expose().chars().count() < MIN_PASSWORD_LEN)
                    .then(|| format!("Password must be at least {MIN_PASSWORD_LEN} characters")),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Constraints spanning several fields of a step.
fn check_cross_field(snapshot: &FormSnapshot, step: StepKey, out: &mut Vec<FieldError>) {
    match step {
        StepKey::AddressDetails => match snapshot.registered_address_count() {
            1 => {}
            0 if snapshot.addresses.is_empty() => {}
            0 => out.push(FieldError::new(
                FieldId::Addresses,
                "Mark one address as the registered address",
            )),
            _ => out.push(FieldError::new(
                FieldId::Addresses,
                "Only one address can be the registered address",
            )),
        },
        StepKey::BrandDetails => {
            for (index, platform) in snapshot.brand.duplicate_platforms() {
                out.push(FieldError::new(
                    FieldId::SellingPlatform {
                        index,
                        field: PlatformField::Platform,
                    },
                    format!("{platform} is already listed"),
                ));
            }
            for (index, entry) in snapshot.brand.selling_platforms.iter().enumerate() {
                let has_platform = !entry.platform.trim().is_empty();
                let has_url = !entry.url.trim().is_empty();
                if has_platform && !has_url {
                    out.push(FieldError::new(
                        FieldId::SellingPlatform {
                            index,
                            field: PlatformField::Url,
                        },
                        "Store URL is required",
                    ));
                } else if has_url && !has_platform {
                    out.push(FieldError::new(
                        FieldId::SellingPlatform {
                            index,
                            field: PlatformField::Platform,
                        },
                        "Choose a platform",
                    ));
                }
            }
        }
        StepKey::PersonalDetails => {
            let p = &snapshot.personal;
            if !p.phone.trim().is_empty() && !p.phone_verified {
                out.push(FieldError::new(
                    FieldId::Personal(PersonalField::Phone),
                    "Verify your phone number",
                ));
            }
            if !p.email.trim().is_empty() && !p.email_verified {
                out.push(FieldError::new(
                    FieldId::Personal(PersonalField::Email),
                    "Verify your email address",
                ));
            }
        }
        _ => {}
    }
}

/// Validate every field of `step`. An empty result means the step may be
/// left.
pub fn validate_step(snapshot: &FormSnapshot, step: StepKey, mode: FlowMode) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for spec in registry::field_specs(step, snapshot, mode) {
        let present = is_filled(snapshot, &spec.id);
        if !present {
            // Lenient: the strict-only logo may still be missing here.
            if spec.requirement.is_required(Strictness::Lenient) {
                let message = match spec.id {
                    FieldId::Addresses => "Add at least one address".to_string(),
                    FieldId::Brand(BrandField::CategoryTags) => {
                        "Choose at least one category".to_string()
                    }
                    _ => format!("{} is required", field_label(&spec.id)),
                };
                errors.push(FieldError::new(spec.id, message));
            }
            continue;
        }
        if spec.requirement == Requirement::StrictOnly {
            continue;
        }
        if let Some(message) = check_format(snapshot, &spec.id) {
            errors.push(FieldError::new(spec.id, message));
        }
    }
    check_cross_field(snapshot, step, &mut errors);
    errors
}

/// Validate every form step in order. Submission needs this to come back
/// empty, since a direct jump skips the per-step checks.
pub fn validate_all(snapshot: &FormSnapshot, mode: FlowMode) -> Vec<FieldError> {
    StepKey::FORM_STEPS
        .into_iter()
        .flat_map(|step| validate_step(snapshot, step, mode))
        .collect()
}
