// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use kiln::recipe::parse;
use kiln::source::RECIPE_FILE;
use kiln::{Manifest, MemorySource};
use std::path::Path;

/// Build recipe text for a package with plain requirements and extra TOML.
///
/// `extra` is appended verbatim and may open tables, so it goes last.
pub fn recipe(name: &str, version: &str, requires: &[&str], extra: &str) -> String {
    let requires: Vec<String> = requires.iter().map(|r| format!("\"{}\"", r)).collect();
    format!(
        "name = \"{}\"\nversion = \"{}\"\nrequires = [{}]\n{}",
        name,
        version,
        requires.join(", "),
        extra
    )
}

/// Parse recipe text that is known to be valid.
pub fn manifest(text: &str) -> Manifest {
    parse(text.as_bytes()).unwrap()
}

/// An in-memory source holding every recipe in `texts`.
pub fn memory_source(texts: &[String]) -> MemorySource {
    let mut source = MemorySource::new();
    for text in texts {
        source.add_recipe(text).unwrap();
    }
    source
}

/// Write a recipe into a directory-source layout under `root`.
pub fn write_recipe(root: &Path, text: &str) {
    let parsed = manifest(text);
    let dir = root.join(parsed.name()).join(parsed.version());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(RECIPE_FILE), text).unwrap();
}
