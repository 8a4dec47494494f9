//! HTTP client for the back-office API.
//!
//! One client backs all three collaborators: registry checks, OTP, and
//! onboarding records. Paths are relative to the configured base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::onboarding::otp::{OtpChannel, OtpService};
use crate::onboarding::record::OnboardingRecord;
use crate::onboarding::submission::{
    ApiResponse, OnboardingApi, PayloadValue, SubmissionPayload, SubmissionTarget,
};
use crate::onboarding::verification::{DocumentVerifier, RegistryStatus, VerificationRequest};

pub struct HttpOnboardingApi {
    base_url: String,
    token: Option<SecretString>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpOnboardingApi {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed {
                endpoint: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url,
            token,
            timeout,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Send and decode a JSON body.
    ///
    /// Non-2xx responses that still carry a JSON envelope with a message are
    /// decoded too, so a server-side rejection reaches the caller verbatim.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !status.is_success() {
            let has_message = serde_json::from_str::<ApiResponse>(&body)
                .is_ok_and(|r| r.message.is_some());
            if has_message {
                debug!(endpoint, status = status.as_u16(), "Error status with message envelope");
                return Ok(serde_json::from_str(&body)?);
            }
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path).json(body), path)
            .await
    }
}

fn verification_call(request: &VerificationRequest) -> (&'static str, serde_json::Value) {
    match request {
        VerificationRequest::Incorporation {
            number,
            name_as_declared,
            establishment_date,
        } => (
            "/verification/incorporation",
            serde_json::json!({
                "number": number,
                "nameAsDeclared": name_as_declared,
                "establishmentDate": establishment_date.format("%Y-%m-%d").to_string(),
            }),
        ),
        VerificationRequest::TaxRegistration { registration_id } => (
            "/verification/tax-registration",
            serde_json::json!({ "registrationId": registration_id }),
        ),
        VerificationRequest::TaxId {
            id,
            name_as_declared,
            date_of_birth,
        } => (
            "/verification/tax-id",
            serde_json::json!({
                "id": id,
                "nameAsDeclared": name_as_declared,
                "dateOfBirth": date_of_birth.format("%Y-%m-%d").to_string(),
            }),
        ),
    }
}

/// Registries answer `{status}`, sometimes wrapped in the usual envelope.
fn registry_status(endpoint: &str, body: &serde_json::Value) -> Result<RegistryStatus, ApiError> {
    body.get("status")
        .or_else(|| body.get("data").and_then(|d| d.get("status")))
        .and_then(|s| s.as_str())
        .map(RegistryStatus::parse)
        .ok_or_else(|| ApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: "missing status".to_string(),
        })
}

#[async_trait]
impl DocumentVerifier for HttpOnboardingApi {
    async fn verify(&self, request: &VerificationRequest) -> Result<RegistryStatus, ApiError> {
        let (path, body) = verification_call(request);
        let resp: serde_json::Value = self.post_json(path, &body).await?;
        let status = registry_status(path, &resp)?;
        debug!(kind = %request.kind(), status = ?status, "Registry answered");
        Ok(status)
    }
}

fn otp_body(channel: OtpChannel, target: &str, otp: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(channel.target_key().to_string(), target.into());
    if let Some(otp) = otp {
        body.insert("otp".to_string(), otp.into());
    }
    serde_json::Value::Object(body)
}

#[async_trait]
impl OtpService for HttpOnboardingApi {
    async fn send(&self, channel: OtpChannel, target: &str) -> Result<(), ApiError> {
        let path = format!("/otp/send/{channel}");
        let body = otp_body(channel, target, None);
        let resp: ApiResponse = self.post_json(&path, &body).await?;
        if !resp.success {
            return Err(ApiError::InvalidResponse {
                endpoint: path,
                reason: resp
                    .message
                    .unwrap_or_else(|| "OTP was not sent".to_string()),
            });
        }
        Ok(())
    }

    async fn verify(
        &self,
        channel: OtpChannel,
        target: &str,
        otp: &str,
    ) -> Result<bool, ApiError> {
        let path = format!("/otp/verify/{channel}");
        let body = otp_body(channel, target, Some(otp));
        let resp: ApiResponse = self.post_json(&path, &body).await?;
        Ok(resp.success)
    }
}

fn multipart_form(endpoint: &str, payload: SubmissionPayload) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for (key, value) in payload.into_fields() {
        form = match value {
            PayloadValue::Text(text) => form.text(key, text),
            PayloadValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| ApiError::RequestFailed {
                        endpoint: endpoint.to_string(),
                        reason: format!("invalid content type for {key}: {e}"),
                    })?;
                form.part(key, part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl OnboardingApi for HttpOnboardingApi {
    async fn submit(
        &self,
        target: &SubmissionTarget,
        payload: SubmissionPayload,
    ) -> Result<ApiResponse, ApiError> {
        let path = target.path();
        let method = match target {
            SubmissionTarget::Create => Method::POST,
            SubmissionTarget::Update { .. } => Method::PUT,
        };
        let form = multipart_form(&path, payload)?;
        info!(endpoint = %path, method = %method, "Sending onboarding");
        self.send(self.request(method, &path).multipart(form), &path)
            .await
    }

    async fn fetch(
        &self,
        company_id: &str,
        location_id: &str,
    ) -> Result<OnboardingRecord, ApiError> {
        let path = format!("/onboarding/{company_id}/{location_id}");
        let resp: ApiResponse = self.send(self.request(Method::GET, &path), &path).await?;
        match resp.data {
            Some(data) if resp.success => Ok(serde_json::from_value(data)?),
            _ => Err(ApiError::InvalidResponse {
                endpoint: path,
                reason: resp
                    .message
                    .unwrap_or_else(|| "no onboarding record in response".to_string()),
            }),
        }
    }
}
