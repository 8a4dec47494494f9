//! Previously saved onboarding records, as returned by the back-office API,
//! and hydration of a snapshot from them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::model::{
    Address, AddressType, Brand, BusinessType, CompanyDetails, Document, DocumentKind, FileRef,
    FormSnapshot, Personal, SellingPlatform, SocialLinks, VerificationPolicy,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressRecord {
    pub id: Option<String>,
    pub address_type: Option<String>,
    pub address_line: String,
    pub landmark: String,
    pub phone: String,
    pub country_code: String,
    pub state_code: String,
    pub city_code: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentRecord {
    pub document_type: String,
    pub document_number: Option<String>,
    pub document_url: Option<String>,
    pub verified: bool,
}

/// A saved onboarding, in wire field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingRecord {
    pub company_id: String,
    pub location_id: String,

    pub company_name: String,
    pub business_type: Option<String>,
    pub establishment_date: Option<NaiveDate>,
    pub company_email: String,
    pub company_phone: String,
    pub website: String,
    pub is_subsidiary: bool,
    pub headquarter_location: String,
    pub logo_url: Option<String>,

    pub addresses: Vec<AddressRecord>,

    pub brand_name: String,
    pub category_tags: Vec<String>,
    pub selling_platforms: Vec<SellingPlatform>,
    pub social_links: SocialLinks,
    pub total_skus: Option<u32>,
    pub average_selling_price: Option<Decimal>,
    pub marketing_budget: Option<Decimal>,

    pub documents: Vec<DocumentRecord>,

    pub owner_name: String,
    pub owner_email: String,
    pub owner_phone: String,
    pub designation: String,

    pub accepted_terms: bool,
}

fn address_type(raw: Option<&str>) -> Option<AddressType> {
    match raw? {
        "registered" => Some(AddressType::Registered),
        "office" => Some(AddressType::Office),
        other => {
            warn!(address_type = other, "Ignoring unknown address type in saved record");
            None
        }
    }
}

impl FormSnapshot {
    /// Hydrate a snapshot from a saved record.
    ///
    /// Documents saved as verified stay verified; kinds the policy does not
    /// send to a registry are verified regardless. The owner's contacts were
    /// OTP-verified when the record was first submitted.
    pub fn from_record(record: &OnboardingRecord, policy: &VerificationPolicy) -> Self {
        let business_type = record.business_type.as_deref().and_then(|raw| {
            raw.parse::<BusinessType>()
                .map_err(|e| warn!(error = %e, "Ignoring business type in saved record"))
                .ok()
        });

        let company = CompanyDetails {
            name: record.company_name.clone(),
            business_type,
            establishment_date: record.establishment_date,
            email: record.company_email.clone(),
            phone: record.company_phone.clone(),
            website: record.website.clone(),
            is_subsidiary: record.is_subsidiary,
            headquarter_location: record.headquarter_location.clone(),
            logo: record.logo_url.clone().filter(|u| !u.is_empty()).map(FileRef::url),
        };

        let addresses = record
            .addresses
            .iter()
            .map(|a| Address {
                id: a.id.clone(),
                address_type: address_type(a.address_type.as_deref()),
                line: a.address_line.clone(),
                landmark: a.landmark.clone(),
                phone: a.phone.clone(),
                country_code: a.country_code.clone(),
                state_code: a.state_code.clone(),
                city_code: a.city_code.clone(),
                postal_code: a.postal_code.clone(),
            })
            .collect();

        let documents = record
            .documents
            .iter()
            .filter_map(|d| {
                let kind = d
                    .document_type
                    .parse::<DocumentKind>()
                    .map_err(|e| warn!(error = %e, "Skipping document in saved record"))
                    .ok()?;
                let mut doc = Document::new(kind, policy);
                doc.number = d.document_number.clone().unwrap_or_default();
                doc.file = d.document_url.clone().filter(|u| !u.is_empty()).map(FileRef::url);
                doc.verified = doc.verified || d.verified;
                Some(doc)
            })
            .collect();

        Self {
            company,
            addresses,
            brand: Brand {
                name: record.brand_name.clone(),
                category_tags: record.category_tags.clone(),
                selling_platforms: record.selling_platforms.clone(),
                social: record.social_links.clone(),
                total_skus: record.total_skus,
                average_selling_price: record.average_selling_price,
                marketing_budget: record.marketing_budget,
            },
            documents,
            personal: Personal {
                name: record.owner_name.clone(),
                email: record.owner_email.clone(),
                phone: record.owner_phone.clone(),
                designation: record.designation.clone(),
                password: Default::default(),
                phone_verified: true,
                email_verified: true,
            },
            accepted_terms: record.accepted_terms,
        }
    }
}
