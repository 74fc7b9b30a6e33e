// src/recipe/mod.rs

//! Recipe model: package manifests and their build options
//!
//! A recipe names a package, the settings it is sensitive to, the options it
//! exposes, and the other packages it requires.
//!
//! # Example Recipe
//!
//! ```toml
//! name = "xrpl"
//! version = "1.8.5"
//! settings = ["os", "compiler", "build_type", "arch"]
//! requires = ["boost/1.77.0", "openssl/1.1.1m", "zlib/[>=1.2 <2]"]
//! pins = ["zlib/1.2.11"]
//! generators = "cmake_find_package"
//!
//! [options]
//! shared = [true, false]
//!
//! [default_options]
//! shared = false
//! "rocksdb:lite" = false
//! ```

mod format;
pub mod options;
mod parser;

pub use format::{Manifest, OneOrMany, PackageId, RawDomain, RecipeFile, Requirement};
pub use options::{OptionDomain, OptionOverride, OptionTarget, OptionValue};
pub use parser::{parse, parse_file, parse_from, parse_requirement};
