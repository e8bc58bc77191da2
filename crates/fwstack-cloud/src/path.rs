//! Construct paths and logical ID allocation
//!
//! Every construct lives at a path such as `NetworkFirewall/Default`. The
//! CloudFormation logical ID of a resource is derived from that path so that it
//! stays stable across synthesis runs.

use crate::error::{CloudError, Result};
use sha2::{Digest, Sha256};
use std::fmt;

const HIDDEN_ID: &str = "Default";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 255 - HASH_LEN;

/// Path of a construct inside a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructPath {
    segments: Vec<String>,
}

impl ConstructPath {
    /// Create a top-level path
    pub fn root(id: &str) -> Result<Self> {
        validate_id(id)?;
        Ok(Self {
            segments: vec![id.to_string()],
        })
    }

    /// Create the path of a child construct
    pub fn child(&self, id: &str) -> Result<Self> {
        validate_id(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(Self { segments })
    }

    /// Construct id (last path segment)
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is a direct child of `other`
    pub fn is_child_of(&self, other: &ConstructPath) -> bool {
        self.parent().as_ref() == Some(other)
    }

    /// CloudFormation logical ID for a resource at this path
    ///
    /// Top-level constructs keep their sanitized id. Nested constructs get a
    /// human-readable prefix (with `Default` segments dropped) followed by an
    /// 8-character hash of the full path.
    pub fn logical_id(&self) -> String {
        if self.segments.len() == 1 {
            return sanitize(&self.segments[0]);
        }

        let mut parts: Vec<String> = Vec::new();
        for segment in &self.segments {
            if segment == HIDDEN_ID {
                continue;
            }
            let clean = sanitize(segment);
            if parts.last() == Some(&clean) {
                continue;
            }
            parts.push(clean);
        }

        let mut human: String = parts.concat();
        if human.len() > MAX_HUMAN_LEN {
            human.truncate(MAX_HUMAN_LEN);
        }
        format!("{}{}", human, path_hash(&self.to_string()))
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || !id.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(CloudError::InvalidConstructId(id.to_string()));
    }
    Ok(())
}

fn sanitize(segment: &str) -> String {
    segment.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn path_hash(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02X}", b)).collect();
    hex[..HASH_LEN].to_string()
}
