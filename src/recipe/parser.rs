// src/recipe/parser.rs

//! Recipe file parsing and validation
//!
//! Parsing is pure: it never touches the network and only reads a file in
//! [`parse_file`]. Dependency-targeted option overrides cannot be checked
//! here because the target recipe is not known yet; the conflict resolver
//! validates them once the graph is built.

use crate::error::{Error, Result};
use crate::recipe::format::{Manifest, PackageId, RawDomain, RecipeFile, Requirement};
use crate::recipe::options::{ANY_DOMAIN, OptionDomain, OptionOverride, OptionTarget};
use crate::version::VersionConstraint;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Parse a recipe from raw bytes
pub fn parse(source: &[u8]) -> Result<Manifest> {
    let text = std::str::from_utf8(source).map_err(|e| malformed("<recipe>", "", e))?;
    let file: RecipeFile = toml::from_str(text).map_err(|e| malformed("<recipe>", "", e))?;
    from_file(file)
}

/// Parse a recipe from a file
pub fn parse_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read(path)?;
    parse_from(&content, &path.display().to_string())
}

/// Parse a recipe, naming `origin` (a path or URL) in errors raised before
/// the recipe's own identity is known
pub fn parse_from(source: &[u8], origin: &str) -> Result<Manifest> {
    parse(source).map_err(|e| match e {
        Error::MalformedManifest {
            manifest,
            field,
            reason,
        } if manifest == "<recipe>" => Error::MalformedManifest {
            manifest: origin.to_string(),
            field,
            reason,
        },
        other => other,
    })
}

/// Parse a `name/constraint` requirement string
pub fn parse_requirement(spec: &str) -> Result<Requirement> {
    let (name, constraint) = spec
        .split_once('/')
        .ok_or_else(|| malformed("<requirement>", spec, "expected `name/version`"))?;
    check_name("<requirement>", spec, name.trim())?;
    let constraint = VersionConstraint::parse(constraint)?;
    Ok(Requirement::new(name.trim(), constraint))
}

fn from_file(file: RecipeFile) -> Result<Manifest> {
    let name = required_field(file.name, "name")?;
    let version = required_field(file.version, "version")?;
    check_name("<recipe>", "name", &name)?;
    check_name("<recipe>", "version", &version)?;

    let mut manifest = Manifest::new(name, version);
    let label = manifest.id.to_string();

    manifest.license = file.license;
    manifest.author = file.author;
    manifest.url = file.url;
    manifest.description = file.description;
    manifest.settings = dedup_preserving_order(file.settings.into_vec());
    manifest.generators = dedup_preserving_order(file.generators.into_vec());
    manifest.setting_overrides = file.setting_overrides;

    manifest.options = parse_domains(&label, file.options)?;

    manifest.pins = parse_requirement_list(&label, "pins", &file.pins)?;
    for pin in &manifest.pins {
        if pin.constraint.exact().is_none() {
            return Err(malformed(
                &label,
                &format!("pins.{}", pin.name),
                "pins must name an exact version",
            ));
        }
    }

    let requires = parse_requirement_list(&label, "requires", &file.requires)?;
    manifest.requires = dedup_requirements(&manifest.id, requires, &manifest.pins)?;

    // Keys as written, per (target, option), to report shadowing
    let mut written: BTreeMap<(OptionTarget, String), String> = BTreeMap::new();
    for (key, value) in file.default_options {
        let (target, option) = split_option_key(&label, &key, &manifest.id)?;
        let entry = OptionOverride {
            target,
            option,
            value,
        };
        let slot = (entry.target.clone(), entry.option.clone());
        if let Some(first) = written.get(&slot) {
            let previous = match &entry.target {
                OptionTarget::SelfPackage => manifest.defaults.get(&entry.option),
                OptionTarget::Package(_) => manifest
                    .overrides
                    .iter()
                    .find(|o| o.target == entry.target && o.option == entry.option)
                    .map(|o| &o.value),
            };
            if let Some(previous) = previous {
                if !previous.same_as(&entry.value) {
                    return Err(Error::InvalidOptionValue {
                        manifest: label.clone(),
                        field: format!("default_options.{}", key),
                        reason: format!(
                            "`{}` conflicts with `{}` = `{}` for the same option",
                            entry.value, first, previous
                        ),
                    });
                }
                debug!("{}: `{}` repeats `{}`", label, key, first);
                continue;
            }
        }
        written.insert(slot, key.clone());
        match entry.target {
            OptionTarget::SelfPackage => {
                let domain = manifest.options.get(&entry.option).ok_or_else(|| {
                    Error::InvalidOptionValue {
                        manifest: label.clone(),
                        field: format!("default_options.{}", key),
                        reason: format!("option `{}` is not declared", entry.option),
                    }
                })?;
                if !domain.contains(&entry.value) {
                    return Err(Error::InvalidOptionValue {
                        manifest: label.clone(),
                        field: format!("default_options.{}", key),
                        reason: format!("`{}` is not one of {}", entry.value, domain),
                    });
                }
                manifest.defaults.insert(entry.option, entry.value);
            }
            OptionTarget::Package(_) => manifest.overrides.push(entry),
        }
    }

    Ok(manifest)
}

fn required_field(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(malformed("<recipe>", field, "must not be empty")),
        None => Err(malformed("<recipe>", field, "missing required field")),
    }
}

fn check_name(manifest: &str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(malformed(manifest, field, "must not be empty"));
    }
    if value.chars().all(|c| c == '.') {
        return Err(malformed(manifest, field, format!("`{}` is not a valid name", value)));
    }
    if value.contains(['/', ':']) || value.contains(char::is_whitespace) {
        return Err(malformed(
            manifest,
            field,
            format!("`{}` must not contain `/`, `:` or whitespace", value),
        ));
    }
    Ok(())
}

fn parse_domains(
    label: &str,
    raw: BTreeMap<String, RawDomain>,
) -> Result<BTreeMap<String, OptionDomain>> {
    raw.into_iter()
        .map(|(name, domain)| {
            let domain = match domain {
                RawDomain::Values(values) if !values.is_empty() => OptionDomain::Values(values),
                RawDomain::Values(_) => {
                    return Err(malformed(
                        label,
                        &format!("options.{}", name),
                        "an option needs at least one legal value",
                    ));
                }
                RawDomain::Keyword(k) if k == ANY_DOMAIN => OptionDomain::Any,
                RawDomain::Keyword(k) => {
                    return Err(malformed(
                        label,
                        &format!("options.{}", name),
                        format!("expected a list of values or \"{}\", found \"{}\"", ANY_DOMAIN, k),
                    ));
                }
            };
            Ok((name, domain))
        })
        .collect()
}

fn parse_requirement_list(label: &str, field: &str, specs: &[String]) -> Result<Vec<Requirement>> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            parse_requirement(spec).map_err(|e| match e {
                Error::MalformedManifest { reason, .. } => {
                    malformed(label, &format!("{}[{}]", field, i), reason)
                }
                other => other,
            })
        })
        .collect()
}

/// Collapse repeated requirements on one package name
///
/// Identical repeats are dropped. Differing repeats are an error unless a
/// pin names the package, in which case the pin's constraint is used at the
/// position of the first occurrence.
fn dedup_requirements(
    id: &PackageId,
    requires: Vec<Requirement>,
    pins: &[Requirement],
) -> Result<Vec<Requirement>> {
    let mut result: Vec<Requirement> = Vec::with_capacity(requires.len());
    for req in requires {
        let pin = pins.iter().find(|p| p.name == req.name);
        match result.iter_mut().find(|r| r.name == req.name) {
            None => result.push(req),
            Some(existing) if existing.constraint == req.constraint => {
                debug!("{}: dropping repeated requirement {}", id, req);
            }
            Some(existing) => match pin {
                Some(pin) => {
                    debug!("{}: pin {} settles {} vs {}", id, pin, existing, req);
                    *existing = pin.clone();
                }
                None => {
                    return Err(Error::DuplicateRequirement {
                        manifest: id.to_string(),
                        package: req.name.clone(),
                        first: existing.to_string(),
                        second: req.to_string(),
                    });
                }
            },
        }
    }
    Ok(result)
}

fn split_option_key(label: &str, key: &str, own: &PackageId) -> Result<(OptionTarget, String)> {
    let field = format!("default_options.{}", key);
    match key.split_once(':') {
        None if !key.trim().is_empty() => Ok((OptionTarget::SelfPackage, key.trim().to_string())),
        None => Err(malformed(label, &field, "empty option name")),
        Some((package, option)) => {
            let (package, option) = (package.trim(), option.trim());
            if package.is_empty() || option.is_empty() || option.contains(':') {
                return Err(malformed(label, &field, "expected `package:option`"));
            }
            if package == own.name || package == "self" {
                Ok((OptionTarget::SelfPackage, option.to_string()))
            } else {
                Ok((OptionTarget::Package(package.to_string()), option.to_string()))
            }
        }
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn malformed(manifest: &str, field: &str, reason: impl ToString) -> Error {
    Error::MalformedManifest {
        manifest: manifest.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
