//! Client for the analysis backend's upload API.

use async_trait::async_trait;
use genomeguard_types::{normalize_base_url, ContentId};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::BackendError;

pub const UPLOAD_PATH: &str = "api/analysis/upload";

/// Attestation details sent alongside an encrypted-path upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAttestation {
    pub content_id: ContentId,
    pub transaction_ref: String,
    pub analysis_ref_hint: Option<u64>,
    pub mock: bool,
}

impl BackendAttestation {
    /// Multipart text fields, in submission order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("on_chain", "true".to_string()),
            ("content_id", self.content_id.to_string()),
            ("transaction_ref", self.transaction_ref.clone()),
        ];
        if let Some(hint) = self.analysis_ref_hint {
            fields.push(("analysis_ref_hint", hint.to_string()));
        }
        fields.push(("mock", self.mock.to_string()));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReceipt {
    pub analysis_id: String,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        attestation: Option<&BackendAttestation>,
    ) -> Result<BackendReceipt, BackendError>;
}

#[derive(Clone)]
pub struct HttpBackendClient {
    base_url: Url,
    http: Client,
}

impl HttpBackendClient {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, BackendError> {
        let raw = base_url.as_ref();
        Ok(Self {
            base_url: normalize_base_url(raw)
                .map_err(|_| BackendError::InvalidBaseUrl(raw.to_string()))?,
            http: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn upload_url(&self) -> Result<Url, BackendError> {
        Ok(self.base_url.join(UPLOAD_PATH)?)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    analysis_id: Value,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: Value,
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn upload(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        attestation: Option<&BackendAttestation>,
    ) -> Result<BackendReceipt, BackendError> {
        let url = self.upload_url()?;

        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/plain")?;
        let mut form = Form::new().part("file", part);
        if let Some(attestation) = attestation {
            for (name, value) in attestation.form_fields() {
                form = form.text(name, value);
            }
        }

        debug!(%url, on_chain = attestation.is_some(), "Uploading to analysis backend");
        let response = self.http.post(url).multipart(form).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            // FastAPI-style `{"detail": ...}` bodies carry the useful message.
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|e| match e.detail {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).to_string());
            return Err(BackendError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadResponse =
            serde_json::from_slice(&bytes).map_err(|e| BackendError::Parse(e.to_string()))?;
        let analysis_id = match parsed.analysis_id {
            Value::String(s) if !s.is_empty() => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(BackendError::Parse(format!(
                    "unexpected analysis_id: {other}"
                )))
            }
        };
        Ok(BackendReceipt { analysis_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url() {
        let client =
            HttpBackendClient::new("http://localhost:8000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.upload_url().unwrap().as_str(),
            "http://localhost:8000/api/analysis/upload"
        );
    }

    #[test]
    fn test_base_url_path_is_kept() {
        let client =
            HttpBackendClient::new("https://backend.example/v2", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.upload_url().unwrap().as_str(),
            "https://backend.example/v2/api/analysis/upload"
        );

        assert!(matches!(
            HttpBackendClient::new("backend.example", Duration::from_secs(5)),
            Err(BackendError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_form_fields() {
        let attestation = BackendAttestation {
            content_id: ContentId::from("Qmmockabc"),
            transaction_ref: "0xmock1".to_string(),
            analysis_ref_hint: Some(1),
            mock: true,
        };
        let fields = attestation.form_fields();
        assert_eq!(
            fields,
            vec![
                ("on_chain", "true".to_string()),
                ("content_id", "Qmmockabc".to_string()),
                ("transaction_ref", "0xmock1".to_string()),
                ("analysis_ref_hint", "1".to_string()),
                ("mock", "true".to_string()),
            ]
        );

        let without_hint = BackendAttestation {
            analysis_ref_hint: None,
            ..attestation
        };
        assert!(without_hint
            .form_fields()
            .iter()
            .all(|(name, _)| *name != "analysis_ref_hint"));
    }
}
