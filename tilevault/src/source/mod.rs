//! Tile source
//!
//! A [`TileSource`] describes a raster tile layer: its URL template,
//! subdomains, tile size and zoom limit. It enumerates the tiles covering a
//! bounding box and maps fetch URLs to canonical storage keys.
//!
//! # Storage keys
//!
//! Subdomains only spread load across hosts; they are not part of a tile's
//! identity. The storage key of a tile is its URL with the subdomain
//! replaced by the first configured subdomain, so the same tile fetched via
//! `a.` or `c.` lands on one key. URLs from templates without `{s}` are
//! their own key.

mod template;

pub use template::UrlTemplate;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::coord::{self, CoordError, LatLngBounds, TileCoord};
use template::Segment;

/// Subdomains used when none are configured.
pub const DEFAULT_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

/// Tile edge length used when none is configured.
pub const DEFAULT_TILE_SIZE: u32 = 256;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("invalid URL template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("URL template placeholder '{{{0}}}' has no value")]
    UnknownPlaceholder(String),

    #[error("URL template uses {{s}} but no subdomains are configured")]
    NoSubdomains,

    #[error("{0}")]
    Coord(#[from] CoordError),
}

/// One tile to download: where to fetch it and where to store it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileDescriptor {
    /// Canonical, subdomain-normalized storage key.
    pub key: String,
    /// Fetch URL with the subdomain selected for this tile.
    pub url: String,
    pub coord: TileCoord,
}

/// A templated raster tile layer.
#[derive(Debug, Clone)]
pub struct TileSource {
    template: UrlTemplate,
    subdomains: Vec<String>,
    tile_size: u32,
    max_zoom: Option<u8>,
    params: BTreeMap<String, String>,
}

impl TileSource {
    /// Creates a source from a URL template with default subdomains and
    /// tile size.
    pub fn new(template: &str) -> Result<Self, SourceError> {
        Ok(Self {
            template: UrlTemplate::parse(template)?,
            subdomains: DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
            tile_size: DEFAULT_TILE_SIZE,
            max_zoom: None,
            params: BTreeMap::new(),
        })
    }

    pub fn with_subdomains<I, S>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Highest zoom level the layer serves.
    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }

    /// Sets the value of a custom `{name}` placeholder.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_zoom(&self) -> Option<u8> {
        self.max_zoom
    }

    /// Number of fetches the provider can comfortably serve at once: one
    /// per subdomain.
    pub fn max_simultaneous(&self) -> usize {
        self.subdomains.len().max(1)
    }

    /// Renders the fetch URL for a tile.
    ///
    /// The subdomain is `subdomains[(x + y) % len]`.
    pub fn tile_url(&self, coord: TileCoord) -> Result<String, SourceError> {
        let subdomain = if self.template.has_subdomain() {
            if self.subdomains.is_empty() {
                return Err(SourceError::NoSubdomains);
            }
            let index = (coord.x as usize + coord.y as usize) % self.subdomains.len();
            self.subdomains[index].as_str()
        } else {
            ""
        };
        self.render(coord, subdomain)
    }

    /// Enumerates the tiles covering `bounds` at `zoom`.
    ///
    /// Tiles come out in row-major order: y ascending, then x ascending.
    pub fn enumerate_tiles(
        &self,
        bounds: &LatLngBounds,
        zoom: u8,
    ) -> Result<Vec<TileDescriptor>, SourceError> {
        let range = coord::tile_range(bounds, zoom, self.tile_size)?;
        let mut tiles = Vec::with_capacity(range.len());

        for coord in range.tiles() {
            let url = self.tile_url(coord)?;
            tiles.push(TileDescriptor {
                key: self.storage_key_of(&url),
                url,
                coord,
            });
        }

        Ok(tiles)
    }

    /// Maps a fetch URL to its canonical storage key.
    ///
    /// The URL is matched against the template; the text that filled `{s}`
    /// is replaced with the first configured subdomain. URLs that do not
    /// match the template, and URLs of templates without `{s}`, are
    /// returned unchanged.
    pub fn storage_key_of(&self, url: &str) -> String {
        let Some(canonical) = self.subdomains.first() else {
            return url.to_string();
        };
        if !self.template.has_subdomain() {
            return url.to_string();
        }

        match self.match_subdomain(url) {
            Some((start, end)) => {
                let mut key = String::with_capacity(url.len());
                key.push_str(&url[..start]);
                key.push_str(canonical);
                key.push_str(&url[end..]);
                key
            }
            None => url.to_string(),
        }
    }

    fn render(&self, coord: TileCoord, subdomain: &str) -> Result<String, SourceError> {
        let mut url = String::with_capacity(self.template.as_str().len() + 16);
        for segment in self.template.segments() {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Subdomain => url.push_str(subdomain),
                Segment::Zoom => url.push_str(&coord.zoom.to_string()),
                Segment::X => url.push_str(&coord.x.to_string()),
                Segment::Y => url.push_str(&coord.y.to_string()),
                Segment::TmsY => url.push_str(&coord.tms_y().to_string()),
                Segment::Retina => {}
                Segment::Param(name) => {
                    let value = self
                        .params
                        .get(name)
                        .ok_or_else(|| SourceError::UnknownPlaceholder(name.clone()))?;
                    url.push_str(value);
                }
            }
        }
        Ok(url)
    }

    /// Locates the byte range of `url` that filled the first `{s}`.
    fn match_subdomain(&self, url: &str) -> Option<(usize, usize)> {
        let mut pos = 0;
        let mut found = None;

        for segment in self.template.segments() {
            let rest = &url[pos..];
            let consumed = match segment {
                Segment::Literal(text) => rest.starts_with(text.as_str()).then_some(text.len())?,
                Segment::Zoom | Segment::X | Segment::Y | Segment::TmsY => {
                    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                    (digits > 0).then_some(digits)?
                }
                Segment::Retina => 0,
                Segment::Param(name) => {
                    let value = self.params.get(name)?;
                    rest.starts_with(value.as_str()).then_some(value.len())?
                }
                Segment::Subdomain => {
                    let len = self
                        .subdomains
                        .iter()
                        .filter(|s| rest.starts_with(s.as_str()))
                        .map(String::len)
                        .max()?;
                    if found.is_none() {
                        found = Some((pos, pos + len));
                    }
                    len
                }
            };
            pos += consumed;
        }

        (pos == url.len()).then_some(found).flatten()
    }
}

/// Parses a subdomain list: comma separated (`"t0,t1,t2"`) or one
/// subdomain per character (`"abc"`).
pub fn parse_subdomains(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.contains(',') {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        value.chars().map(String::from).collect()
    }
}
