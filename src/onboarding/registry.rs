//! Step registry — which form fields belong to each step, and which of them
//! are currently required.
//!
//! Everything here is pure. The registry decides which fields apply given the
//! snapshot and flow mode; it never judges whether a value is acceptable.

use serde::{Serialize, Serializer};

use super::model::{DocumentKind, FormSnapshot};
use super::state::{FlowMode, StepKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanyField {
    Name,
    BusinessType,
    EstablishmentDate,
    Email,
    Phone,
    Website,
    HeadquarterLocation,
    Logo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    Type,
    Line,
    Landmark,
    Phone,
    Country,
    State,
    City,
    PostalCode,
}

impl AddressField {
    pub const ALL: [AddressField; 8] = [
        AddressField::Type,
        AddressField::Line,
        AddressField::Landmark,
        AddressField::Phone,
        AddressField::Country,
        AddressField::State,
        AddressField::City,
        AddressField::PostalCode,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrandField {
    Name,
    TotalSkus,
    CategoryTags,
    AverageSellingPrice,
    MarketingBudget,
    Website,
    Instagram,
    Facebook,
    Linkedin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformField {
    Platform,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentField {
    Number,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonalField {
    Name,
    Email,
    Phone,
    Designation,
    Password,
}

/// Identifier of one form field, rendered as a dotted path
/// (`addresses.1.postal_code`, `documents.tax_id.number`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Company(CompanyField),
    /// The address list as a whole (registered-address invariant).
    Addresses,
    Address { index: usize, field: AddressField },
    Brand(BrandField),
    SellingPlatform { index: usize, field: PlatformField },
    Document { kind: DocumentKind, field: DocumentField },
    Personal(PersonalField),
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Company(field) => {
                let name = match field {
                    CompanyField::Name => "name",
                    CompanyField::BusinessType => "business_type",
                    CompanyField::EstablishmentDate => "establishment_date",
                    CompanyField::Email => "email",
                    CompanyField::Phone => "phone",
                    CompanyField::Website => "website",
                    CompanyField::HeadquarterLocation => "headquarter_location",
                    CompanyField::Logo => "logo",
                };
                write!(f, "company.{name}")
            }
            Self::Addresses => write!(f, "addresses"),
            Self::Address { index, field } => {
                let name = match field {
                    AddressField::Type => "address_type",
                    AddressField::Line => "line",
                    AddressField::Landmark => "landmark",
                    AddressField::Phone => "phone",
                    AddressField::Country => "country_code",
                    AddressField::State => "state_code",
                    AddressField::City => "city_code",
                    AddressField::PostalCode => "postal_code",
                };
                write!(f, "addresses.{index}.{name}")
            }
            Self::Brand(field) => {
                let name = match field {
                    BrandField::Name => "name",
                    BrandField::TotalSkus => "total_skus",
                    BrandField::CategoryTags => "category_tags",
                    BrandField::AverageSellingPrice => "average_selling_price",
                    BrandField::MarketingBudget => "marketing_budget",
                    BrandField::Website => "social.website",
                    BrandField::Instagram => "social.instagram",
                    BrandField::Facebook => "social.facebook",
                    BrandField::Linkedin => "social.linkedin",
                };
                write!(f, "brand.{name}")
            }
            Self::SellingPlatform { index, field } => {
                let name = match field {
                    PlatformField::Platform => "platform",
                    PlatformField::Url => "url",
                };
                write!(f, "brand.selling_platforms.{index}.{name}")
            }
            Self::Document { kind, field } => {
                let name = match field {
                    DocumentField::Number => "number",
                    DocumentField::File => "file",
                };
                write!(f, "documents.{kind}.{name}")
            }
            Self::Personal(field) => {
                let name = match field {
                    PersonalField::Name => "name",
                    PersonalField::Email => "email",
                    PersonalField::Phone => "phone",
                    PersonalField::Designation => "designation",
                    PersonalField::Password => "password",
                };
                write!(f, "personal.{name}")
            }
        }
    }
}

impl Serialize for FieldId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How strongly a field is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Must be filled to move past the step.
    Required,
    /// Only needed to finish the whole flow (e.g. the company logo).
    StrictOnly,
    /// May be left blank; validated for format when present.
    Optional,
}

/// Strictness of a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Good enough to navigate forward.
    Lenient,
    /// Good enough to finish onboarding.
    Strict,
}

impl Requirement {
    pub fn is_required(&self, strictness: Strictness) -> bool {
        match self {
            Self::Required => true,
            Self::StrictOnly => strictness == Strictness::Strict,
            Self::Optional => false,
        }
    }
}

/// An applicable field together with its current requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: FieldId,
    pub requirement: Requirement,
}

type Predicate = fn(&FormSnapshot, FlowMode) -> bool;

struct Rule<F> {
    field: F,
    applies: Predicate,
    requirement: Requirement,
}

fn always(_: &FormSnapshot, _: FlowMode) -> bool {
    true
}

fn is_subsidiary(snapshot: &FormSnapshot, _: FlowMode) -> bool {
    snapshot.company.is_subsidiary
}

fn is_new_account(_: &FormSnapshot, mode: FlowMode) -> bool {
    mode == FlowMode::Add
}

#[rustfmt::skip]
const COMPANY_RULES: &[Rule<CompanyField>] = &[
    Rule { field: CompanyField::Name, applies: always, requirement: Requirement::Required },
    Rule { field: CompanyField::BusinessType, applies: always, requirement: Requirement::Required },
    Rule { field: CompanyField::EstablishmentDate, applies: always, requirement: Requirement::Required },
    Rule { field: CompanyField::Email, applies: always, requirement: Requirement::Required },
    Rule { field: CompanyField::Phone, applies: always, requirement: Requirement::Required },
    Rule { field: CompanyField::Website, applies: always, requirement: Requirement::Optional },
    Rule { field: CompanyField::HeadquarterLocation, applies: is_subsidiary, requirement: Requirement::Required },
    Rule { field: CompanyField::Logo, applies: always, requirement: Requirement::StrictOnly },
];

#[rustfmt::skip]
const BRAND_RULES: &[Rule<BrandField>] = &[
    Rule { field: BrandField::Name, applies: always, requirement: Requirement::Required },
    Rule { field: BrandField::TotalSkus, applies: always, requirement: Requirement::Required },
    Rule { field: BrandField::CategoryTags, applies: always, requirement: Requirement::Required },
    Rule { field: BrandField::AverageSellingPrice, applies: always, requirement: Requirement::Required },
    Rule { field: BrandField::MarketingBudget, applies: always, requirement: Requirement::Required },
    Rule { field: BrandField::Website, applies: always, requirement: Requirement::Optional },
    Rule { field: BrandField::Instagram, applies: always, requirement: Requirement::Optional },
    Rule { field: BrandField::Facebook, applies: always, requirement: Requirement::Optional },
    Rule { field: BrandField::Linkedin, applies: always, requirement: Requirement::Optional },
];

#[rustfmt::skip]
const PERSONAL_RULES: &[Rule<PersonalField>] = &[
    Rule { field: PersonalField::Name, applies: always, requirement: Requirement::Required },
    Rule { field: PersonalField::Email, applies: always, requirement: Requirement::Required },
    Rule { field: PersonalField::Phone, applies: always, requirement: Requirement::Required },
    Rule { field: PersonalField::Designation, applies: always, requirement: Requirement::Required },
    Rule { field: PersonalField::Password, applies: is_new_account, requirement: Requirement::Required },
];

fn collect<F: Copy>(
    rules: &[Rule<F>],
    snapshot: &FormSnapshot,
    mode: FlowMode,
    wrap: fn(F) -> FieldId,
    out: &mut Vec<FieldSpec>,
) {
    out.extend(
        rules
            .iter()
            .filter(|r| (r.applies)(snapshot, mode))
            .map(|r| FieldSpec {
                id: wrap(r.field),
                requirement: r.requirement,
            }),
    );
}

/// Document kinds the snapshot's business must provide, in a stable order.
///
/// Tax ID and tax registration are always needed; the incorporation
/// certificate is skipped for sole proprietors; any other kind becomes
/// required once the user has added an entry for it.
pub fn document_kinds_required(snapshot: &FormSnapshot) -> Vec<DocumentKind> {
    let incorporated = snapshot
        .company
        .business_type
        .is_none_or(|t| t.is_incorporated());

    DocumentKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            DocumentKind::Incorporation => incorporated,
            DocumentKind::TaxId | DocumentKind::TaxRegistration => true,
            other => snapshot.document(*other).is_some(),
        })
        .collect()
}

/// Every applicable field of `step`, with its requirement.
pub fn field_specs(step: StepKey, snapshot: &FormSnapshot, mode: FlowMode) -> Vec<FieldSpec> {
    let mut out = Vec::new();
    match step {
        StepKey::CompanyDetails => {
            collect(COMPANY_RULES, snapshot, mode, FieldId::Company, &mut out)
        }
        StepKey::AddressDetails => {
            out.push(FieldSpec {
                id: FieldId::Addresses,
                requirement: Requirement::Required,
            });
            for index in 0..snapshot.addresses.len() {
                out.extend(AddressField::ALL.into_iter().map(|field| FieldSpec {
                    id: FieldId::Address { index, field },
                    requirement: Requirement::Required,
                }));
            }
        }
        StepKey::BrandDetails => {
            collect(BRAND_RULES, snapshot, mode, FieldId::Brand, &mut out);
            for index in 0..snapshot.brand.selling_platforms.len() {
                for field in [PlatformField::Platform, PlatformField::Url] {
                    out.push(FieldSpec {
                        id: FieldId::SellingPlatform { index, field },
                        requirement: Requirement::Optional,
                    });
                }
            }
        }
        StepKey::DocumentDetails => {
            for kind in document_kinds_required(snapshot) {
                if !kind.is_upload_only() {
                    out.push(FieldSpec {
                        id: FieldId::Document {
                            kind,
                            field: DocumentField::Number,
                        },
                        requirement: Requirement::Required,
                    });
                }
                out.push(FieldSpec {
                    id: FieldId::Document {
                        kind,
                        field: DocumentField::File,
                    },
                    requirement: Requirement::Required,
                });
            }
        }
        StepKey::PersonalDetails => {
            collect(PERSONAL_RULES, snapshot, mode, FieldId::Personal, &mut out)
        }
        StepKey::ThankYou => {}
    }
    out
}

/// Ordered field identifiers that apply to `step` right now.
pub fn fields_for_step(step: StepKey, snapshot: &FormSnapshot, mode: FlowMode) -> Vec<FieldId> {
    field_specs(step, snapshot, mode)
        .into_iter()
        .map(|spec| spec.id)
        .collect()
}

/// The subset of [`fields_for_step`] that must be filled at `strictness`.
pub fn required_fields(
    step: StepKey,
    snapshot: &FormSnapshot,
    mode: FlowMode,
    strictness: Strictness,
) -> Vec<FieldId> {
    field_specs(step, snapshot, mode)
        .into_iter()
        .filter(|spec| spec.requirement.is_required(strictness))
        .map(|spec| spec.id)
        .collect()
}

/// Which step owns a field.
pub fn step_of(field: &FieldId) -> StepKey {
    match field {
        FieldId::Company(_) => StepKey::CompanyDetails,
        FieldId::Addresses | FieldId::Address { .. } => StepKey::AddressDetails,
        FieldId::Brand(_) | FieldId::SellingPlatform { .. } => StepKey::BrandDetails,
        FieldId::Document { .. } => StepKey::DocumentDetails,
        FieldId::Personal(_) => StepKey::PersonalDetails,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::{Address, AddressType, BusinessType, SellingPlatform};

    fn names(fields: &[FieldId]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn headquarters_only_listed_for_subsidiaries() {
        let mut snapshot = FormSnapshot::default();
        let fields = fields_for_step(StepKey::CompanyDetails, &snapshot, FlowMode::Add);
        assert!(!fields.contains(&FieldId::Company(CompanyField::HeadquarterLocation)));

        snapshot.company.is_subsidiary = true;
        let fields = fields_for_step(StepKey::CompanyDetails, &snapshot, FlowMode::Add);
        assert!(fields.contains(&FieldId::Company(CompanyField::HeadquarterLocation)));
    }

    #[test]
    fn logo_required_only_when_strict() {
        let snapshot = FormSnapshot::default();
        let logo = FieldId::Company(CompanyField::Logo);
        let company = StepKey::CompanyDetails;
        let lenient = required_fields(company, &snapshot, FlowMode::Add, Strictness::Lenient);
        let strict = required_fields(company, &snapshot, FlowMode::Add, Strictness::Strict);
        assert!(!lenient.contains(&logo));
        assert!(strict.contains(&logo));
    }

    #[test]
    fn password_absent_outside_add_mode() {
        let snapshot = FormSnapshot::default();
        let password = FieldId::Personal(PersonalField::Password);
        let personal = |mode| fields_for_step(StepKey::PersonalDetails, &snapshot, mode);
        assert!(personal(FlowMode::Add).contains(&password));
        assert!(!personal(FlowMode::Edit).contains(&password));
        assert!(!personal(FlowMode::View).contains(&password));
    }

    #[test]
    fn address_fields_expand_per_row() {
        let mut snapshot = FormSnapshot::default();
        snapshot.addresses.push(Address::with_type(AddressType::Office));
        let fields = names(&fields_for_step(StepKey::AddressDetails, &snapshot, FlowMode::Add));
        assert_eq!(fields.len(), 1 + 2 * AddressField::ALL.len());
        assert_eq!(fields[0], "addresses");
        assert!(fields.contains(&"addresses.1.postal_code".to_string()));
    }

    #[test]
    fn sole_proprietors_skip_incorporation() {
        let mut snapshot = FormSnapshot::default();
        snapshot.company.business_type = Some(BusinessType::PrivateLimited);
        assert!(document_kinds_required(&snapshot).contains(&DocumentKind::Incorporation));

        snapshot.company.business_type = Some(BusinessType::SoleProprietorship);
        let kinds = document_kinds_required(&snapshot);
        assert_eq!(kinds, vec![DocumentKind::TaxId, DocumentKind::TaxRegistration]);
        let fields = names(&fields_for_step(StepKey::DocumentDetails, &snapshot, FlowMode::Add));
        assert!(fields.iter().all(|f| !f.starts_with("documents.incorporation")));
    }

    #[test]
    fn added_optional_documents_become_required() {
        let mut snapshot = FormSnapshot::default();
        snapshot.ensure_document(DocumentKind::BrandAuthorization, &Default::default());
        let fields = names(&fields_for_step(StepKey::DocumentDetails, &snapshot, FlowMode::Add));
        assert!(fields.contains(&"documents.brand_authorization.file".to_string()));
        // upload-only kinds never list a number
        assert!(!fields.contains(&"documents.brand_authorization.number".to_string()));
    }

    #[test]
    fn selling_platform_rows_are_optional() {
        let mut snapshot = FormSnapshot::default();
        snapshot.brand.selling_platforms.push(SellingPlatform::new("amazon", ""));
        let specs = field_specs(StepKey::BrandDetails, &snapshot, FlowMode::Add);
        let row = specs
            .iter()
            .find(|s| s.id.to_string() == "brand.selling_platforms.0.url")
            .unwrap();
        assert_eq!(row.requirement, Requirement::Optional);
    }

    #[test]
    fn field_ids_serialize_as_paths() {
        let id = FieldId::Document {
            kind: DocumentKind::TaxRegistration,
            field: DocumentField::Number,
        };
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"documents.tax_registration.number\"");
        assert_eq!(step_of(&id), StepKey::DocumentDetails);
    }

    #[test]
    fn terminal_step_has_no_fields() {
        let snapshot = FormSnapshot::default();
        assert!(fields_for_step(StepKey::ThankYou, &snapshot, FlowMode::Add).is_empty());
    }
}
