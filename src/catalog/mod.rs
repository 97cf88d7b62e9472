//! Directory catalog loading.
//!
//! The catalog is a static, versioned JSON registry of known directories.
//! It is loaded once at startup; reload is an explicit operator action, never
//! automatic.

mod types;

pub use types::{BusinessProfile, Difficulty, DirectoryDescriptor, RequirementFlags, Tier};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Deserialize;

/// On-disk shape of the catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    /// Catalog schema/content version, logged on load
    version: String,
    directories: Vec<DirectoryDescriptor>,
}

/// The loaded directory catalog.
///
/// Descriptors are shared as `Arc`s because both engines hold references to
/// them for the life of a run.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    version: String,
    entries: Vec<Arc<DirectoryDescriptor>>,
}

impl Catalog {
    /// Loads the catalog from a JSON file.
    ///
    /// Validates that directory ids are unique and submission URLs parse;
    /// entries with invalid URLs are dropped with a warning rather than
    /// failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains duplicate directory ids.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(file.directories.len());
        for descriptor in file.directories {
            if !seen.insert(descriptor.id.clone()) {
                bail!("Duplicate directory id in catalog: {}", descriptor.id);
            }
            if let Err(e) = url::Url::parse(&descriptor.submission_url) {
                warn!(
                    "Dropping catalog entry '{}': invalid submission URL '{}': {}",
                    descriptor.id, descriptor.submission_url, e
                );
                continue;
            }
            entries.push(Arc::new(descriptor));
        }

        info!(
            "Loaded catalog {} (version {}): {} directories",
            path.display(),
            file.version,
            entries.len()
        );

        Ok(Catalog {
            path: path.to_path_buf(),
            version: file.version,
            entries,
        })
    }

    /// Re-reads the catalog file this catalog was loaded from.
    ///
    /// This is the explicit operator reload; nothing in the engines calls it
    /// on their own.
    pub fn reload(&mut self) -> Result<()> {
        let fresh = Catalog::load(&self.path)?;
        info!(
            "Catalog reloaded: version {} -> {}, {} -> {} directories",
            self.version,
            fresh.version,
            self.entries.len(),
            fresh.entries.len()
        );
        *self = fresh;
        Ok(())
    }

    /// Returns the catalog content version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All directory descriptors, in catalog order.
    pub fn entries(&self) -> &[Arc<DirectoryDescriptor>] {
        &self.entries
    }

    /// Looks up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&Arc<DirectoryDescriptor>> {
        self.entries.iter().find(|d| d.id == id)
    }

    /// Descriptors ordered for bulk enqueueing: tier first, then
    /// domain-authority descending as the tie-break within a tier.
    pub fn submission_order(&self) -> Vec<Arc<DirectoryDescriptor>> {
        let mut ordered = self.entries.clone();
        ordered.sort_by(|a, b| {
            b.tier
                .cmp(&a.tier)
                .then_with(|| b.domain_authority.cmp(&a.domain_authority))
        });
        ordered
    }
}
