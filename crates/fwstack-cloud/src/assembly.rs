//! Cloud assembly output
//!
//! Writes synthesized templates into an output directory (`fwstack.out` by
//! default) together with a `manifest.json` describing every stack.

use crate::error::{CloudError, Result};
use crate::template::Template;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const ASSEMBLY_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const BACKUP_SUFFIX: &str = "backup";

/// Assembly manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version
    pub version: u32,

    /// Last written timestamp
    pub created_at: DateTime<Utc>,

    /// Stack artifacts indexed by stack name
    pub stacks: IndexMap<String, StackArtifact>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: ASSEMBLY_VERSION,
            created_at: Utc::now(),
            stacks: IndexMap::new(),
        }
    }
}

/// A single stack inside the assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackArtifact {
    /// Template file name, relative to the assembly directory
    pub template_file: String,

    /// Number of resources in the template
    pub resource_count: usize,
}

/// Reader/writer for an assembly directory
pub struct Assembly {
    out_dir: PathBuf,
}

impl Assembly {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the template file for `stack_name`
    pub fn template_path(&self, stack_name: &str) -> PathBuf {
        self.out_dir.join(template_file_name(stack_name))
    }

    fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    async fn ensure_out_dir(&self) -> Result<()> {
        if !self.out_dir.exists() {
            fs::create_dir_all(&self.out_dir).await?;
            tracing::debug!("Created assembly directory: {}", self.out_dir.display());
        }
        Ok(())
    }

    /// Load the manifest, or an empty one if none was written yet
    pub async fn load_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        if !path.exists() {
            tracing::debug!("Manifest not found, returning empty manifest");
            return Ok(Manifest::default());
        }

        let content = fs::read_to_string(&path).await?;
        let manifest: Manifest = serde_json::from_str(&content)?;

        if manifest.version > ASSEMBLY_VERSION {
            return Err(CloudError::AssemblyError(format!(
                "Manifest version {} is newer than supported version {}",
                manifest.version, ASSEMBLY_VERSION
            )));
        }

        Ok(manifest)
    }

    /// Write the template for `stack_name` and update the manifest
    ///
    /// An existing template is moved aside to `<file>.backup` first.
    pub async fn write(&self, stack_name: &str, template: &Template) -> Result<PathBuf> {
        self.ensure_out_dir().await?;

        let path = self.template_path(stack_name);
        if path.exists() {
            let backup = path.with_extension(format!("json.{}", BACKUP_SUFFIX));
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Backed up previous template to {}", backup.display());
        }

        fs::write(&path, template.to_json()?).await?;

        let mut manifest = self.load_manifest().await?;
        manifest.created_at = Utc::now();
        manifest.stacks.insert(
            stack_name.to_string(),
            StackArtifact {
                template_file: template_file_name(stack_name),
                resource_count: template.resources.len(),
            },
        );
        fs::write(
            self.manifest_path(),
            serde_json::to_string_pretty(&manifest)?,
        )
        .await?;

        tracing::info!(
            stack = %stack_name,
            path = %path.display(),
            "Wrote template"
        );
        Ok(path)
    }

    /// Read a previously written template
    pub async fn read_template(&self, stack_name: &str) -> Result<Template> {
        let path = self.template_path(stack_name);
        if !path.exists() {
            return Err(CloudError::AssemblyError(format!(
                "template not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(&path).await?;
        Template::from_json(&content)
    }
}

fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}
