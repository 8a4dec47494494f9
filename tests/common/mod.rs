//! Stub back office shared by the integration tests.
//!
//! Serves the registry, OTP and onboarding-record endpoints on a random port
//! and records every call it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use marketplace_onboarding::onboarding::model::*;

/// The code the stub OTP service accepts.
pub const OTP_CODE: &str = "123456";

/// One multipart part as the stub saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedPart {
    Text(String),
    File { file_name: String, len: usize },
}

#[derive(Debug, Clone)]
pub struct ReceivedSubmission {
    pub method: String,
    pub path: String,
    pub parts: Vec<(String, ReceivedPart)>,
}

impl ReceivedSubmission {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.parts.iter().find_map(|(k, v)| match v {
            ReceivedPart::Text(t) if k == key => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.parts.iter().any(|(k, _)| k == key)
    }
}

#[derive(Default)]
pub struct BackOfficeLog {
    /// Registry kind (path segment) → status to answer with.
    pub registry: HashMap<String, String>,
    pub registry_delay: Option<Duration>,
    pub verification_calls: Vec<(String, Value)>,
    pub otp_sent: Vec<(String, Value)>,
    pub submissions: Vec<ReceivedSubmission>,
    /// Set to reject submissions with this message.
    pub reject_with: Option<String>,
    pub record: Option<Value>,
    pub authorization: Vec<String>,
}

#[derive(Clone, Default)]
pub struct BackOffice {
    pub log: Arc<Mutex<BackOfficeLog>>,
}

impl BackOffice {
    pub fn answer(&self, kind: &str, status: &str) {
        self.log
            .lock()
            .unwrap()
            .registry
            .insert(kind.to_string(), status.to_string());
    }

    pub fn verification_calls(&self) -> Vec<(String, Value)> {
        self.log.lock().unwrap().verification_calls.clone()
    }

    pub fn submissions(&self) -> Vec<ReceivedSubmission> {
        self.log.lock().unwrap().submissions.clone()
    }
}

async fn verification(
    State(office): State<BackOffice>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, delay) = {
        let mut log = office.log.lock().unwrap();
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            log.authorization.push(auth.to_string());
        }
        log.verification_calls.push((kind.clone(), body));
        let default = if kind == "tax-id" { "valid" } else { "active" };
        let status = log.registry.get(&kind).cloned().unwrap_or(default.to_string());
        (status, log.registry_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Json(json!({ "status": status }))
}

async fn otp_send(
    State(office): State<BackOffice>,
    Path(channel): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    office.log.lock().unwrap().otp_sent.push((channel, body));
    Json(json!({ "success": true }))
}

async fn otp_verify(Json(body): Json<Value>) -> impl IntoResponse {
    let ok = body["otp"] == OTP_CODE;
    if ok {
        Json(json!({ "success": true })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Invalid OTP" })),
        )
            .into_response()
    }
}

async fn read_parts(mut multipart: Multipart) -> Vec<(String, ReceivedPart)> {
    let mut parts = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.unwrap_or_default();
        let part = match file_name {
            Some(file_name) => ReceivedPart::File {
                file_name,
                len: bytes.len(),
            },
            None => ReceivedPart::Text(String::from_utf8_lossy(&bytes).into_owned()),
        };
        parts.push((name, part));
    }
    parts
}

fn submission_reply(
    office: &BackOffice,
    submission: ReceivedSubmission,
) -> axum::response::Response {
    let mut log = office.log.lock().unwrap();
    log.submissions.push(submission);
    match &log.reject_with {
        Some(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response(),
        None => Json(json!({
            "success": true,
            "message": "Onboarding saved",
            "data": { "companyId": "c-100", "locationId": "l-100" }
        }))
        .into_response(),
    }
}

async fn create_onboarding(
    State(office): State<BackOffice>,
    multipart: Multipart,
) -> impl IntoResponse {
    let parts = read_parts(multipart).await;
    submission_reply(
        &office,
        ReceivedSubmission {
            method: "POST".into(),
            path: "/onboarding".into(),
            parts,
        },
    )
}

async fn update_onboarding(
    State(office): State<BackOffice>,
    Path((company_id, location_id)): Path<(String, String)>,
    multipart: Multipart,
) -> impl IntoResponse {
    let parts = read_parts(multipart).await;
    submission_reply(
        &office,
        ReceivedSubmission {
            method: "PUT".into(),
            path: format!("/onboarding/{company_id}/{location_id}"),
            parts,
        },
    )
}

async fn get_onboarding(State(office): State<BackOffice>) -> impl IntoResponse {
    match office.log.lock().unwrap().record.clone() {
        Some(record) => Json(json!({ "success": true, "data": record })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Onboarding not found" })),
        )
            .into_response(),
    }
}

pub fn back_office_routes(office: BackOffice) -> Router {
    Router::new()
        .route("/verification/{kind}", post(verification))
        .route("/otp/send/{channel}", post(otp_send))
        .route("/otp/verify/{channel}", post(otp_verify))
        .route("/onboarding", post(create_onboarding))
        .route(
            "/onboarding/{company_id}/{location_id}",
            get(get_onboarding).put(update_onboarding),
        )
        .with_state(office)
}

/// Serve `app` on a random local port and return the port.
pub async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

pub async fn start_back_office() -> (String, BackOffice) {
    let office = BackOffice::default();
    let port = serve(back_office_routes(office.clone())).await;
    (format!("http://127.0.0.1:{port}"), office)
}

/// A snapshot that passes every step once its documents and contacts are
/// verified. Documents and contacts start unverified.
pub fn filled_snapshot() -> FormSnapshot {
    let policy = VerificationPolicy::default();
    let mut snapshot = FormSnapshot::fresh(&policy);

    snapshot.company = CompanyDetails {
        name: "Acme Retail Pvt Ltd".into(),
        business_type: Some(BusinessType::PrivateLimited),
        establishment_date: NaiveDate::from_ymd_opt(2020, 3, 14),
        email: "ops@acme.example".into(),
        phone: "9876543210".into(),
        website: "https://acme.example".into(),
        is_subsidiary: false,
        headquarter_location: String::new(),
        logo: Some(FileRef::upload("logo.png", "image/png", vec![137, 80, 78, 71])),
    };

    snapshot.addresses = vec![Address {
        address_type: Some(AddressType::Registered),
        line: "12 Industrial Estate".into(),
        landmark: "Near the old mill".into(),
        phone: "9876543210".into(),
        country_code: "IN".into(),
        state_code: "MH".into(),
        city_code: "MUM".into(),
        postal_code: "400001".into(),
        ..Default::default()
    }];

    snapshot.brand = Brand {
        name: "Acme".into(),
        category_tags: vec!["home".into()],
        selling_platforms: vec![SellingPlatform::new("amazon", "https://amazon.in/acme")],
        social: SocialLinks::default(),
        total_skus: Some(120),
        average_selling_price: Some(dec!(499.00)),
        marketing_budget: Some(dec!(250000)),
    };

    for (kind, number) in [
        (DocumentKind::Incorporation, "U12345MH2020PTC000001"),
        (DocumentKind::TaxId, "ABCDE1234F"),
        (DocumentKind::TaxRegistration, "27ABCDE1234F1Z5"),
    ] {
        let doc = snapshot.ensure_document(kind, &policy);
        doc.number = number.into();
        doc.file = Some(FileRef::url(format!("https://files.example/{kind}.pdf")));
    }

    snapshot.personal = Personal {
        name: "Asha Rao".into(),
        email: "asha@acme.example".into(),
        phone: "9123456780".into(),
        designation: "Director".into(),
        password: Password::new("s3cret-Pass"),
        phone_verified: false,
        email_verified: false,
    };
    snapshot.accepted_terms = true;
    snapshot
}

/// JSON body for `PUT /api/onboarding/snapshot`. The password never
/// serializes, so it is added by hand.
pub fn snapshot_body(snapshot: &FormSnapshot) -> Value {
    let mut body = serde_json::to_value(snapshot).unwrap();
    body["personal"]["password"] = json!(snapshot.personal.password.expose());
    body
}

/// A saved onboarding as the back office returns it.
pub fn saved_record() -> Value {
    json!({
        "companyId": "c-1",
        "locationId": "l-1",
        "companyName": "Acme Retail Pvt Ltd",
        "businessType": "private_limited",
        "establishmentDate": "2020-03-14",
        "companyEmail": "ops@acme.example",
        "companyPhone": "9876543210",
        "logoUrl": "https://files.example/logo.png",
        "addresses": [{
            "id": "a-1",
            "addressType": "registered",
            "addressLine": "12 Industrial Estate",
            "landmark": "Near the old mill",
            "phone": "9876543210",
            "countryCode": "IN",
            "stateCode": "MH",
            "cityCode": "MUM",
            "postalCode": "400001"
        }],
        "brandName": "Acme",
        "categoryTags": ["home"],
        "sellingPlatforms": [{"platform": "amazon", "url": "https://amazon.in/acme"}],
        "totalSkus": 120,
        "averageSellingPrice": "499.00",
        "marketingBudget": "250000",
        "documents": [
            {
                "documentType": "incorporation",
                "documentNumber": "U12345MH2020PTC000001",
                "documentUrl": "https://files.example/cin.pdf",
                "verified": true
            },
            {
                "documentType": "tax_id",
                "documentNumber": "ABCDE1234F",
                "documentUrl": "https://files.example/pan.pdf",
                "verified": true
            },
            {
                "documentType": "tax_registration",
                "documentNumber": "27ABCDE1234F1Z5",
                "documentUrl": "https://files.example/gst.pdf",
                "verified": true
            }
        ],
        "ownerName": "Asha Rao",
        "ownerEmail": "asha@acme.example",
        "ownerPhone": "9123456780",
        "designation": "Director",
        "acceptedTerms": true
    })
}
