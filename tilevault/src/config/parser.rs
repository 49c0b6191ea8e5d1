//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_ZOOM;
use crate::source::{parse_subdomains, UrlTemplate};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.store.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(invalid(
                    "store",
                    "name",
                    v,
                    "must be a non-empty name without path separators",
                ));
            }
            config.store.name = v.to_string();
        }
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            UrlTemplate::parse(v).map_err(|e| invalid("source", "url", v, &e.to_string()))?;
            config.source.url = v.to_string();
        }
        if let Some(v) = section.get("subdomains") {
            let subdomains = parse_subdomains(v);
            if subdomains.is_empty() {
                return Err(invalid(
                    "source",
                    "subdomains",
                    v,
                    "must list at least one subdomain, e.g. 'abc' or 'a1,a2'",
                ));
            }
            config.source.subdomains = subdomains;
        }
        if let Some(v) = section.get("tile_size") {
            let size: u32 = parse_number("source", "tile_size", v)?;
            if size == 0 {
                return Err(invalid("source", "tile_size", v, "must be greater than 0"));
            }
            config.source.tile_size = size;
        }
        if let Some(v) = section.get("max_zoom") {
            config.source.max_zoom = match v.trim() {
                "" => None,
                _ => Some(parse_zoom("source", "max_zoom", v)?),
            };
        }
    }

    // [save] section
    if let Some(section) = ini.section(Some("save")) {
        if let Some(v) = section.get("minimal_zoom") {
            config.save.minimal_zoom = parse_zoom("save", "minimal_zoom", v)?;
        }
        if let Some(v) = section.get("max_zoom") {
            config.save.max_zoom = parse_zoom("save", "max_zoom", v)?;
        }
        if let Some(v) = section.get("concurrency") {
            config.save.concurrency = parse_number("save", "concurrency", v)?;
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("timeout") {
            let timeout: u64 = parse_number("download", "timeout", v)?;
            if timeout == 0 {
                return Err(invalid(
                    "download",
                    "timeout",
                    v,
                    "must be a positive integer (seconds)",
                ));
            }
            config.download.timeout = timeout;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("file")) {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<u8, ConfigFileError> {
    match value.trim().parse::<u8>() {
        Ok(zoom) if zoom <= MAX_ZOOM => Ok(zoom),
        _ => Err(invalid(
            section,
            key,
            value,
            &format!("must be a zoom level between 0 and {}", MAX_ZOOM),
        )),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
