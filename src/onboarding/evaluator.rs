//! Completion evaluator — decides whether a step is done.
//!
//! Two bars exist. *Lenient* is what forward navigation needs; *strict* is
//! what finishing the flow needs (files attached, documents verified). A
//! missing logo, for instance, blocks submission but not moving past the
//! company step. Nothing here is cached: every call reads the snapshot as it
//! is now.

use super::model::FormSnapshot;
use super::registry::{
    self, AddressField, BrandField, CompanyField, DocumentField, FieldId, PersonalField,
    PlatformField, Strictness,
};
use super::state::{FlowMode, StepKey};

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Whether the value behind `field` is present. Says nothing about format.
pub fn is_filled(snapshot: &FormSnapshot, field: &FieldId) -> bool {
    match *field {
        FieldId::Company(f) => {
            let c = &snapshot.company;
            match f {
                CompanyField::Name => filled(&c.name),
                CompanyField::BusinessType => c.business_type.is_some(),
                CompanyField::EstablishmentDate => c.establishment_date.is_some(),
                CompanyField::Email => filled(&c.email),
                CompanyField::Phone => filled(&c.phone),
                CompanyField::Website => filled(&c.website),
                CompanyField::HeadquarterLocation => filled(&c.headquarter_location),
                CompanyField::Logo => c.logo.as_ref().is_some_and(|l| !l.is_empty()),
            }
        }
        FieldId::Addresses => !snapshot.addresses.is_empty(),
        FieldId::Address { index, field } => {
            let Some(a) = snapshot.addresses.get(index) else {
                return false;
            };
            match field {
                AddressField::Type => a.address_type.is_some(),
                AddressField::Line => filled(&a.line),
                AddressField::Landmark => filled(&a.landmark),
                AddressField::Phone => filled(&a.phone),
                AddressField::Country => filled(&a.country_code),
                AddressField::State => filled(&a.state_code),
                AddressField::City => filled(&a.city_code),
                AddressField::PostalCode => filled(&a.postal_code),
            }
        }
        FieldId::Brand(f) => {
            let b = &snapshot.brand;
            match f {
                BrandField::Name => filled(&b.name),
                BrandField::TotalSkus => b.total_skus.is_some(),
                BrandField::CategoryTags => b.category_tags.iter().any(|t| filled(t)),
                BrandField::AverageSellingPrice => b.average_selling_price.is_some(),
                BrandField::MarketingBudget => b.marketing_budget.is_some(),
                BrandField::Website => filled(&b.social.website),
                BrandField::Instagram => filled(&b.social.instagram),
                BrandField::Facebook => filled(&b.social.facebook),
                BrandField::Linkedin => filled(&b.social.linkedin),
            }
        }
        FieldId::SellingPlatform { index, field } => {
            let Some(p) = snapshot.brand.selling_platforms.get(index) else {
                return false;
            };
            match field {
                PlatformField::Platform => filled(&p.platform),
                PlatformField::Url => filled(&p.url),
            }
        }
        FieldId::Document { kind, field } => {
            let Some(d) = snapshot.document(kind) else {
                return false;
            };
            match field {
                DocumentField::Number => d.has_number(),
                DocumentField::File => d.has_file(),
            }
        }
        FieldId::Personal(f) => {
            let p = &snapshot.personal;
            match f {
                PersonalField::Name => filled(&p.name),
                PersonalField::Email => filled(&p.email),
                PersonalField::Phone => filled(&p.phone),
                PersonalField::Designation => filled(&p.designation),
                PersonalField::Password => !p.password.is_empty(),
            }
        }
    }
}

/// Whether `step` is complete at the given strictness.
///
/// The terminal step counts as complete only once every form step is
/// strictly complete.
pub fn is_step_complete(
    snapshot: &FormSnapshot,
    step: StepKey,
    mode: FlowMode,
    strictness: Strictness,
) -> bool {
    if step.is_terminal() {
        return are_all_steps_completed(snapshot, mode);
    }

    let fields_ok = registry::required_fields(step, snapshot, mode, strictness)
        .iter()
        .all(|f| is_filled(snapshot, f));
    if !fields_ok {
        return false;
    }

    match step {
        StepKey::AddressDetails => snapshot.registered_address_count() == 1,
        StepKey::DocumentDetails => {
            strictness == Strictness::Lenient
                || registry::document_kinds_required(snapshot)
                    .into_iter()
                    .all(|kind| snapshot.document(kind).is_some_and(|d| d.verified))
        }
        StepKey::PersonalDetails => {
            snapshot.personal.phone_verified && snapshot.personal.email_verified
        }
        _ => true,
    }
}

/// First step, in wizard order, that is not leniently complete. Returns the
/// terminal step when every form step passes.
pub fn compute_first_incomplete_step(snapshot: &FormSnapshot, mode: FlowMode) -> StepKey {
    StepKey::FORM_STEPS
        .into_iter()
        .find(|step| !is_step_complete(snapshot, *step, mode, Strictness::Lenient))
        .unwrap_or(StepKey::ThankYou)
}

/// First step, in wizard order, that is not strictly complete.
pub fn first_strictly_incomplete_step(snapshot: &FormSnapshot, mode: FlowMode) -> Option<StepKey> {
    StepKey::FORM_STEPS
        .into_iter()
        .find(|step| !is_step_complete(snapshot, *step, mode, Strictness::Strict))
}

/// Every form step passes the strict bar.
pub fn are_all_steps_completed(snapshot: &FormSnapshot, mode: FlowMode) -> bool {
    first_strictly_incomplete_step(snapshot, mode).is_none()
}

/// Per-step completion, for status reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepCompletion {
    pub step: StepKey,
    pub lenient: bool,
    pub strict: bool,
}

pub fn completion_summary(snapshot: &FormSnapshot, mode: FlowMode) -> Vec<StepCompletion> {
    StepKey::FORM_STEPS
        .into_iter()
        .map(|step| StepCompletion {
            step,
            lenient: is_step_complete(snapshot, step, mode, Strictness::Lenient),
            strict: is_step_complete(snapshot, step, mode, Strictness::Strict),
        })
        .collect()
}
