//! HTTP client for the instance metadata service.
//!
//! The metadata service is a link-local HTTP endpoint exposed by the hosting
//! platform. Only the instance identity resources are needed here.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MetadataError, Result};

/// Path of the signed instance identity document.
pub const IDENTITY_DOCUMENT_RESOURCE: &str = "dynamic/instance-identity/document";

/// Path of the signature over the instance identity document.
pub const IDENTITY_SIGNATURE_RESOURCE: &str = "dynamic/instance-identity/signature";

/// Source of node identity attestation.
///
/// The two reads fail independently; callers decide how to degrade.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Read the raw instance identity document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be retrieved.
    async fn identity_document(&self) -> Result<Vec<u8>>;

    /// Read the signature over the instance identity document.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature cannot be retrieved.
    async fn identity_signature(&self) -> Result<Vec<u8>>;
}

/// Metadata provider backed by the platform's HTTP metadata endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataClient {
    /// Create a new metadata client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The metadata base URL (e.g., "http://169.254.169.254/latest")
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client, base_url)
    }

    /// Create a new metadata client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Get the base URL of the metadata service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Read an arbitrary metadata resource relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::Request` on transport failure and
    /// `MetadataError::Status` if the service answers with a non-success status.
    pub async fn read_resource(&self, resource: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::Request {
                resource: resource.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(resource, status = %status, "Metadata resource unavailable");
            return Err(MetadataError::Status {
                resource: resource.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| MetadataError::Request {
            resource: resource.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataClient {
    async fn identity_document(&self) -> Result<Vec<u8>> {
        self.read_resource(IDENTITY_DOCUMENT_RESOURCE).await
    }

    async fn identity_signature(&self) -> Result<Vec<u8>> {
        self.read_resource(IDENTITY_SIGNATURE_RESOURCE).await
    }
}

/// A fixed metadata provider for nodes without a metadata service.
///
/// A missing document or signature is reported as
/// [`MetadataError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    document: Option<Vec<u8>>,
    signature: Option<Vec<u8>>,
}

impl StaticMetadata {
    /// A provider with no identity document at all.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// A provider returning the given document and signature.
    #[must_use]
    pub fn new(document: impl Into<Vec<u8>>, signature: Option<Vec<u8>>) -> Self {
        Self {
            document: Some(document.into()),
            signature,
        }
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadata {
    async fn identity_document(&self) -> Result<Vec<u8>> {
        self.document
            .clone()
            .ok_or_else(|| MetadataError::Unavailable(IDENTITY_DOCUMENT_RESOURCE.to_string()))
    }

    async fn identity_signature(&self) -> Result<Vec<u8>> {
        self.signature
            .clone()
            .ok_or_else(|| MetadataError::Unavailable(IDENTITY_SIGNATURE_RESOURCE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpMetadataClient::new("http://169.254.169.254/latest/");
        assert_eq!(client.base_url(), "http://169.254.169.254/latest");
    }

    #[tokio::test]
    async fn reads_identity_document_and_signature() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/dynamic/instance-identity/document"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"region":"us-east-1"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/dynamic/instance-identity/signature"))
            .respond_with(ResponseTemplate::new(200).set_body_string("c2lnbmF0dXJl"))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(format!("{}/latest", server.uri()));

        let document = client.identity_document().await.unwrap();
        assert_eq!(document, br#"{"region":"us-east-1"}"#.to_vec());

        let signature = client.identity_signature().await.unwrap();
        assert_eq!(signature, b"c2lnbmF0dXJl".to_vec());
    }

    #[tokio::test]
    async fn not_found_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(server.uri());
        let err = client.identity_document().await.unwrap_err();

        match &err {
            MetadataError::Status { status, resource } => {
                assert_eq!(*status, 404);
                assert_eq!(resource, IDENTITY_DOCUMENT_RESOURCE);
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn server_errors_are_retriable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(server.uri());
        let err = client.identity_signature().await.unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn static_metadata_unavailable() {
        let metadata = StaticMetadata::unavailable();
        assert!(matches!(
            metadata.identity_document().await,
            Err(MetadataError::Unavailable(_))
        ));
        assert!(metadata.identity_signature().await.is_err());
    }

    #[tokio::test]
    async fn static_metadata_document_without_signature() {
        let metadata = StaticMetadata::new(b"doc".to_vec(), None);
        assert_eq!(metadata.identity_document().await.unwrap(), b"doc".to_vec());
        assert!(metadata.identity_signature().await.is_err());
    }
}
