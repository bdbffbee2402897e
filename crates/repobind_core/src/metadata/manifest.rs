//! Declarative JSON manifest for custom repository registrations.
//!
//! ```json
//! {
//!   "repositories": [
//!     { "repository": "PostRepository", "entity": "Post" },
//!     { "repository": "AuditRepository" }
//!   ]
//! }
//! ```

use crate::metadata::store::{MetadataStoreBuilder, RegistrationError};
use serde::{Deserialize, Serialize};

/// Parsed manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryManifest {
    #[serde(default)]
    pub repositories: Vec<ManifestEntry>,
}

/// One manifest declaration. A missing `entity` registers an unbound repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl RepositoryManifest {
    pub fn from_json(text: &str) -> Result<Self, RegistrationError> {
        serde_json::from_str(text).map_err(|err| RegistrationError::InvalidManifest(err.to_string()))
    }
}

impl MetadataStoreBuilder {
    /// Registers every manifest entry in document order.
    ///
    /// Stops at the first failing entry; entries before it stay registered.
    pub fn load_manifest(
        &mut self,
        manifest: &RepositoryManifest,
    ) -> Result<&mut Self, RegistrationError> {
        for entry in &manifest.repositories {
            self.register_named(&entry.repository, entry.entity.as_deref())?;
        }
        Ok(self)
    }

    /// Parses and registers a JSON manifest.
    pub fn load_manifest_json(&mut self, text: &str) -> Result<&mut Self, RegistrationError> {
        let manifest = RepositoryManifest::from_json(text)?;
        self.load_manifest(&manifest)
    }
}
