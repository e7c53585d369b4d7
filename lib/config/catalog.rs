use std::{collections::BTreeMap, path::Path};

use getset::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;
use typed_builder::TypedBuilder;

use crate::ShellboxResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single entry in the image catalog.
///
/// The declared `ram`/`cpu` resource class is informational only; the limits
/// actually enforced at run time are the fixed [`ResourceLimits`] constants.
///
/// [`ResourceLimits`]: super::ResourceLimits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ImageDescriptor {
    /// The engine image reference backing this entry.
    #[builder(setter(transform = |image: impl AsRef<str>| image.as_ref().to_string()))]
    image: String,

    /// Human-readable label.
    #[builder(setter(transform = |label: impl AsRef<str>| label.as_ref().to_string()))]
    label: String,

    /// Short description shown to requesters.
    #[builder(setter(transform = |description: impl AsRef<str>| description.as_ref().to_string()))]
    description: String,

    /// Declared RAM class (informational).
    #[builder(setter(transform = |ram: impl AsRef<str>| ram.as_ref().to_string()))]
    ram: String,

    /// Declared CPU class (informational).
    #[builder(setter(transform = |cpu: impl AsRef<str>| cpu.as_ref().to_string()))]
    cpu: String,
}

/// The static catalog of images a sandbox may be provisioned from, keyed by
/// image key.
///
/// The catalog is not persisted with the ledger; it is configuration handed to
/// the lifecycle manager at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ImageCatalog {
    images: BTreeMap<String, ImageDescriptor>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageCatalog {
    /// Returns the built-in catalog.
    pub fn builtin() -> Self {
        let mut images = BTreeMap::new();
        images.insert(
            "ubuntu-22.04".to_string(),
            ImageDescriptor::builder()
                .image("ubuntu-22.04-with-tmate")
                .label("Ubuntu 22.04")
                .description("Standard Ubuntu 22.04 with tmate pre-installed")
                .ram("6GB")
                .cpu("2 vCPU")
                .build(),
        );
        Self { images }
    }

    /// Loads a catalog from a JSON file mapping image keys to descriptors.
    pub async fn from_file(path: impl AsRef<Path>) -> ShellboxResult<Self> {
        let bytes = fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Looks up a descriptor by image key.
    pub fn get(&self, image_key: &str) -> Option<&ImageDescriptor> {
        self.images.get(image_key)
    }

    /// Iterates over `(image_key, descriptor)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ImageDescriptor)> {
        self.images.iter()
    }

    /// Returns the number of catalog entries.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_has_default_image() {
        let catalog = ImageCatalog::builtin();
        let descriptor = catalog.get("ubuntu-22.04").expect("default entry missing");

        assert_eq!(descriptor.get_image(), "ubuntu-22.04-with-tmate");
        assert!(catalog.get("windows-95").is_none());
    }

    #[tokio::test]
    async fn test_catalog_file_round_trip() -> ShellboxResult<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("catalog.json");

        let catalog = ImageCatalog::builtin();
        tokio::fs::write(&path, serde_json::to_vec_pretty(&catalog)?).await?;

        let loaded = ImageCatalog::from_file(&path).await?;
        assert_eq!(loaded, catalog);

        Ok(())
    }
}
