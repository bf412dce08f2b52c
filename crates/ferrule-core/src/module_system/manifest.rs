use std::collections::{HashMap, HashSet};

use semver::Version;
use thiserror::Error;

use crate::kernel::constants::MANIFEST_VERSION;

/// Manifest header key: unique module identifier
pub const HEADER_SYMBOLIC_NAME: &str = "SymbolicName";
/// Manifest header key: module version (semantic triple)
pub const HEADER_VERSION: &str = "Version";
/// Manifest header key: manifest format version
pub const HEADER_MANIFEST_VERSION: &str = "ManifestVersion";
/// Manifest header key: human-readable name
pub const HEADER_NAME: &str = "Name";
/// Manifest header key: copyright/owner string
pub const HEADER_VENDOR: &str = "Vendor";
/// Manifest header key: library exposing the activator entry point
pub const HEADER_ACTIVATOR_LIBRARY: &str = "ActivatorLibrary";
/// Manifest header key: entry symbol override within the activator library
pub const HEADER_ACTIVATOR_CLASS: &str = "ActivatorClass";
/// Manifest header key: comma/semicolon-separated dependency symbolic names
pub const HEADER_REQUIRE_MODULE: &str = "RequireModule";

/// Error raised when a manifest header table cannot be parsed
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("missing required header '{0}'")]
    MissingHeader(&'static str),

    #[error("header '{0}' must not be empty")]
    EmptyHeader(&'static str),

    #[error("invalid version '{value}': {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("unsupported manifest version '{found}' (supported: {MANIFEST_VERSION})")]
    UnsupportedManifestVersion { found: String },
}

/// The declarative metadata describing one module.
///
/// Parsing is pure: it reads an unordered string header table and has no
/// side effects. Unknown headers are preserved verbatim and retrievable
/// via [`header`](Self::header); they do not affect the lifecycle.
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    symbolic_name: String,
    version: Version,
    name: Option<String>,
    vendor: Option<String>,
    activator_library: Option<String>,
    activator_symbol: Option<String>,
    requires: Vec<String>,
    headers: HashMap<String, String>,
}

impl ModuleManifest {
    /// Parse a manifest from a raw header table.
    pub fn parse(headers: &HashMap<String, String>) -> Result<Self, ManifestError> {
        let symbolic_name = required(headers, HEADER_SYMBOLIC_NAME)?;
        let version_str = required(headers, HEADER_VERSION)?;
        let version = Version::parse(&version_str).map_err(|source| ManifestError::InvalidVersion {
            value: version_str,
            source,
        })?;
        let manifest_version = required(headers, HEADER_MANIFEST_VERSION)?;
        if manifest_version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedManifestVersion {
                found: manifest_version,
            });
        }

        let requires = headers
            .get(HEADER_REQUIRE_MODULE)
            .map(|raw| parse_require_list(raw))
            .unwrap_or_default();

        Ok(Self {
            symbolic_name,
            version,
            name: optional(headers, HEADER_NAME),
            vendor: optional(headers, HEADER_VENDOR),
            activator_library: optional(headers, HEADER_ACTIVATOR_LIBRARY),
            activator_symbol: optional(headers, HEADER_ACTIVATOR_CLASS),
            requires,
            headers: headers.clone(),
        })
    }

    /// Build a manifest programmatically (statically linked modules, tests).
    pub fn new(symbolic_name: &str, version: Version) -> Self {
        let mut headers = HashMap::new();
        headers.insert(HEADER_SYMBOLIC_NAME.to_string(), symbolic_name.to_string());
        headers.insert(HEADER_VERSION.to_string(), version.to_string());
        headers.insert(
            HEADER_MANIFEST_VERSION.to_string(),
            MANIFEST_VERSION.to_string(),
        );
        Self {
            symbolic_name: symbolic_name.to_string(),
            version,
            name: None,
            vendor: None,
            activator_library: None,
            activator_symbol: None,
            requires: Vec::new(),
            headers,
        }
    }

    /// Builder-style dependency declaration
    pub fn require(mut self, symbolic_name: &str) -> Self {
        if !self.requires.iter().any(|existing| existing == symbolic_name) {
            self.requires.push(symbolic_name.to_string());
        }
        self.headers.insert(
            HEADER_REQUIRE_MODULE.to_string(),
            self.requires.join(","),
        );
        self
    }

    /// Builder-style human-readable name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self.headers.insert(HEADER_NAME.to_string(), name.to_string());
        self
    }

    /// Builder-style vendor string
    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = Some(vendor.to_string());
        self.headers
            .insert(HEADER_VENDOR.to_string(), vendor.to_string());
        self
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn activator_library(&self) -> Option<&str> {
        self.activator_library.as_deref()
    }

    pub fn activator_symbol(&self) -> Option<&str> {
        self.activator_symbol.as_deref()
    }

    /// Declared dependency symbolic names, in declaration order
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Raw header lookup; unknown headers are preserved verbatim.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

fn required(headers: &HashMap<String, String>, key: &'static str) -> Result<String, ManifestError> {
    let value = headers
        .get(key)
        .ok_or(ManifestError::MissingHeader(key))?
        .trim();
    if value.is_empty() {
        return Err(ManifestError::EmptyHeader(key));
    }
    Ok(value.to_string())
}

fn optional(headers: &HashMap<String, String>, key: &str) -> Option<String> {
    headers
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Split a `RequireModule` header on commas and semicolons, trimming
/// whitespace and dropping duplicates while preserving declaration order.
fn parse_require_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter(|part| seen.insert(part.to_string()))
        .map(str::to_string)
        .collect()
}
