//! Core types and configuration for keel.
//!
//! This crate provides the foundational types shared by the keel crates:
//!
//! - **Identifiers**: Strongly-typed, never-empty IDs for clusters, container
//!   instances, and tasks
//! - **Configuration**: [`AgentConfig`], loaded from the environment
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use keel_core::{AgentConfig, ClusterRef};
//!
//! let config = AgentConfig::default();
//! assert!(config.cluster.is_none());
//!
//! // After registration the resolved cluster is threaded back in.
//! let config = config.with_cluster(ClusterRef::new("default").unwrap());
//! assert_eq!(config.cluster.unwrap().as_str(), "default");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod ids;

pub use config::{AgentConfig, DEFAULT_CLUSTER_NAME};
pub use error::{CoreError, Result};
pub use ids::{ClusterRef, ContainerInstanceArn, IdError, TaskArn};
