//! fwstack construct graph
//!
//! This crate provides the provider-agnostic part of fwstack: a tree of
//! constructs, deploy-time tokens, and synthesis of the resulting resource
//! graph into a CloudFormation template.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   fwstack CLI                    │
//! │               (fwstack synth/validate)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                fwstack-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Stack (construct tree + resources)     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │   Tokens     │  │   Assembly   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │ fwstack-cloud-aws │
//! │ (VPC, firewall,   │
//! │  EC2 constructs)  │
//! └───────────────────┘
//! ```
//!
//! Construction is single-pass: a construct declares its resources in order,
//! reading back tokens of earlier resources. Referencing a resource that has
//! not been declared yet is an error.

pub mod assembly;
pub mod error;
pub mod path;
pub mod stack;
pub mod template;
pub mod token;

// Re-exports
pub use assembly::{Assembly, Manifest, StackArtifact};
pub use error::{CloudError, Result};
pub use path::ConstructPath;
pub use stack::{Parameter, ResourceRef, Stack};
pub use template::{Template, TemplateSummary};
pub use token::Token;

/// A node of the construct tree
pub trait Construct {
    /// Path of this construct inside its stack
    fn path(&self) -> &ConstructPath;
}
