//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let max_zoom = config
        .source
        .max_zoom
        .map(|z| z.to_string())
        .unwrap_or_default();
    let subdomains = format_subdomains(&config.source.subdomains);

    format!(
        r#"[store]
; Directory holding on-disk stores (one subdirectory per store)
directory = {}
; Store name
name = {}

[source]
; Tile URL template. Placeholders: {{s}} subdomain, {{z}} zoom, {{x}} column,
; {{y}} row, {{-y}} TMS row, {{name}} custom parameter
url = {}
; Subdomains used for {{s}}: either one character each ("abc") or a
; comma-separated list ("tile1,tile2")
subdomains = {}
; Tile edge in pixels
tile_size = {}
; Highest zoom the layer serves (empty = no limit)
max_zoom = {}

[save]
; Saves from a view zoomed out further than this are refused
minimal_zoom = {}
; Highest zoom saved when the layer sets none
max_zoom = {}
; Simultaneous downloads (0 = one per subdomain)
concurrency = {}

[download]
; HTTP request timeout in seconds
timeout = {}

[logging]
directory = {}
file = {}
"#,
        path_to_string(&config.store.directory),
        config.store.name,
        config.source.url,
        subdomains,
        config.source.tile_size,
        max_zoom,
        config.save.minimal_zoom,
        config.save.max_zoom,
        config.save.concurrency,
        config.download.timeout,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Writes single-character subdomains as one word and anything else as a
/// comma list. A lone multi-character subdomain keeps a trailing comma so
/// it is not split into characters on load.
fn format_subdomains(subdomains: &[String]) -> String {
    if subdomains.iter().all(|s| s.chars().count() == 1) {
        subdomains.concat()
    } else if subdomains.len() == 1 {
        format!("{},", subdomains[0])
    } else {
        subdomains.join(",")
    }
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
