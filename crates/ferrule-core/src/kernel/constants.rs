/// Runtime name
pub const RUNTIME_NAME: &str = "Ferrule";

/// Runtime version
pub const RUNTIME_VERSION: &str = "0.1.0";

/// Manifest format version understood by this runtime.
/// Manifests declaring any other `ManifestVersion` are rejected at install.
pub const MANIFEST_VERSION: &str = "1";

/// Default directory scanned for module manifests
pub const DEFAULT_MODULES_DIR: &str = "modules";

/// Default entry symbol resolved in a module library to obtain its activator.
/// A manifest's `ActivatorClass` header overrides it.
pub const DEFAULT_ACTIVATOR_SYMBOL: &str = "ferrule_create_activator";
