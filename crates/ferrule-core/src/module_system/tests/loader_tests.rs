use std::fs;
use std::path::Path;

use semver::Version;
use tempfile::tempdir;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::loader::{
    LibraryHandle, MANIFEST_FILE_NAME, discover_manifests, load_manifest_file,
};
use crate::module_system::manifest::ManifestError;

fn write_module(dir: &Path, name: &str, json: &str) {
    let module_dir = dir.join(name);
    fs::create_dir(&module_dir).unwrap();
    fs::write(module_dir.join(MANIFEST_FILE_NAME), json).unwrap();
}

#[test]
fn load_manifest_file_parses_full_manifest() {
    let dir = tempdir().unwrap();
    write_module(
        dir.path(),
        "viewer",
        r#"{
            "symbolic_name": "org.app.viewer",
            "version": "2.1.0",
            "manifest_version": "1",
            "name": "Viewer",
            "vendor": "Example Labs",
            "activator_library": "libviewer.so",
            "activator_class": "viewer_create_activator",
            "require_module": ["org.app.core", "org.app.io"]
        }"#,
    );

    let manifest = load_manifest_file(&dir.path().join("viewer").join(MANIFEST_FILE_NAME)).unwrap();
    assert_eq!(manifest.symbolic_name(), "org.app.viewer");
    assert_eq!(manifest.version(), &Version::new(2, 1, 0));
    assert_eq!(manifest.name(), Some("Viewer"));
    assert_eq!(manifest.vendor(), Some("Example Labs"));
    assert_eq!(manifest.activator_library(), Some("libviewer.so"));
    assert_eq!(manifest.activator_symbol(), Some("viewer_create_activator"));
    assert_eq!(manifest.requires(), ["org.app.core", "org.app.io"]);
}

#[test]
fn missing_manifest_version_field_is_a_manifest_error() {
    let dir = tempdir().unwrap();
    write_module(
        dir.path(),
        "legacy",
        r#"{"symbolic_name": "org.app.legacy", "version": "1.0.0"}"#,
    );

    let result = load_manifest_file(&dir.path().join("legacy").join(MANIFEST_FILE_NAME));
    assert!(matches!(
        result,
        Err(ModuleSystemError::Manifest(ManifestError::MissingHeader(_)))
    ));
}

#[test]
fn unreadable_or_malformed_files_are_loading_errors() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope").join(MANIFEST_FILE_NAME);
    assert!(matches!(
        load_manifest_file(&missing),
        Err(ModuleSystemError::LoadingError { path, .. }) if path == missing
    ));

    write_module(dir.path(), "garbled", "{not json");
    let garbled = dir.path().join("garbled").join(MANIFEST_FILE_NAME);
    assert!(matches!(
        load_manifest_file(&garbled),
        Err(ModuleSystemError::LoadingError { message, .. })
            if message.starts_with("invalid manifest JSON")
    ));
}

#[test]
fn discovery_scans_sorted_and_skips_broken_manifests() {
    let dir = tempdir().unwrap();
    write_module(
        dir.path(),
        "beta",
        r#"{"symbolic_name": "org.app.beta", "version": "1.0.0", "manifest_version": "1"}"#,
    );
    write_module(
        dir.path(),
        "alpha",
        r#"{"symbolic_name": "org.app.alpha", "version": "1.0.0", "manifest_version": "1"}"#,
    );
    // Broken manifest: logged and skipped.
    write_module(dir.path(), "broken", "{oops");
    // Directory without a manifest: ignored.
    fs::create_dir(dir.path().join("empty")).unwrap();
    // Stray file at the top level: ignored.
    fs::write(dir.path().join("README.txt"), "not a module").unwrap();

    let discovered = discover_manifests(dir.path()).unwrap();
    let names: Vec<&str> = discovered
        .iter()
        .map(|(_, manifest)| manifest.symbolic_name())
        .collect();
    assert_eq!(names, ["org.app.alpha", "org.app.beta"]);
    assert!(discovered[0].0.ends_with("alpha"));
}

#[test]
fn discovery_of_a_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let gone = dir.path().join("no-such-dir");
    assert!(matches!(
        discover_manifests(&gone),
        Err(ModuleSystemError::LoadingError { path, .. }) if path == gone
    ));
}

#[test]
fn opening_a_nonexistent_library_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("libmissing.so");
    assert!(matches!(
        LibraryHandle::open(&path),
        Err(ModuleSystemError::LoadingError { path: failed, .. }) if failed == path
    ));
}
