//! Asset manifest: what the installer puts into a fresh store.

use serde::{Deserialize, Serialize};

/// Assets a minimal installable web app needs to open offline.
const DEFAULT_MANDATORY: [&str; 4] = [
    "./index.html",
    "./manifest.webmanifest",
    "./icon-192.png",
    "./icon-512.png",
];

/// Ordered asset references, partitioned by whether their absence blocks
/// installation. Entries are resolved against the application's base URL, so
/// both relative (`./index.html`) and absolute URLs are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub mandatory: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

impl AssetManifest {
    pub fn new<M, O>(mandatory: M, optional: O) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            mandatory: mandatory.into_iter().map(Into::into).collect(),
            optional: optional.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.mandatory.len() + self.optional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::new(DEFAULT_MANDATORY, Vec::<String>::new())
    }
}
