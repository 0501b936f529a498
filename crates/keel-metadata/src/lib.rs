//! Instance metadata access for keel.
//!
//! The control plane uses a signed instance identity document to attest
//! which node is registering. This crate reads that document and its
//! signature from the hosting platform's metadata service.
//!
//! # Example
//!
//! ```no_run
//! use keel_metadata::{HttpMetadataClient, MetadataProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metadata = HttpMetadataClient::new("http://169.254.169.254/latest");
//!
//! let document = metadata.identity_document().await?;
//! let signature = metadata.identity_signature().await?;
//! println!("document: {} bytes, signature: {} bytes", document.len(), signature.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;

pub use client::{
    HttpMetadataClient, MetadataProvider, StaticMetadata, IDENTITY_DOCUMENT_RESOURCE,
    IDENTITY_SIGNATURE_RESOURCE,
};
pub use error::{MetadataError, Result};
