//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.0511287798;
pub const MAX_LAT: f64 = 85.0511287798;

/// Valid longitude range
pub const MIN_LNG: f64 = -180.0;
pub const MAX_LNG: f64 = 180.0;

/// Zoom levels accepted by the projection.
///
/// Raster providers rarely go past 22; anything beyond overflows `u32`
/// pixel space at 256px tiles well before 32.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 24;

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Rectangular geographic area.
///
/// Corners are normalized on construction so that `south <= north` and
/// `west <= east` regardless of the order they were supplied in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl LatLngBounds {
    /// Creates bounds spanning two arbitrary corners.
    pub fn new(a: LatLng, b: LatLng) -> Self {
        Self {
            south: a.lat.min(b.lat),
            west: a.lng.min(b.lng),
            north: a.lat.max(b.lat),
            east: a.lng.max(b.lng),
        }
    }

    /// Creates bounds from explicit edges (north, west, south, east).
    pub fn from_edges(north: f64, west: f64, south: f64, east: f64) -> Self {
        Self::new(LatLng::new(north, west), LatLng::new(south, east))
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north, self.west)
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south, self.east)
    }

    /// Returns true if the position lies inside (or on the edge of) the bounds.
    pub fn contains(&self, point: LatLng) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }
}

/// Position in projected pixel space at some zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Tile coordinates in the Web Mercator / Slippy Map system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// X coordinate (east-west), 0 at west
    pub x: u32,
    /// Y coordinate (north-south), 0 at north
    pub y: u32,
    /// Zoom level
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Row index in TMS numbering (origin at the south edge).
    #[inline]
    pub fn tms_y(&self) -> u32 {
        let max_index = (1u64 << self.zoom) - 1;
        (max_index - self.y as u64) as u32
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangle of tile indices at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Number of tiles covered, `(max_x - min_x + 1) * (max_y - min_y + 1)`.
    pub fn len(&self) -> usize {
        let width = (self.max_x - self.min_x) as usize + 1;
        let height = (self.max_y - self.min_y) as usize + 1;
        width * height
    }

    /// A range always covers at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over every tile in the range.
    ///
    /// Tiles are yielded in row-major order: y ascending in the outer loop,
    /// x ascending in the inner loop.
    #[inline]
    pub fn tiles(&self) -> TileRangeIterator {
        TileRangeIterator {
            range: *self,
            current: 0,
        }
    }
}

impl IntoIterator for TileRange {
    type Item = TileCoord;
    type IntoIter = TileRangeIterator;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles()
    }
}

/// Iterator over all tiles in a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIterator {
    range: TileRange,
    current: usize,
}

impl Iterator for TileRangeIterator {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.range.len() {
            return None;
        }

        let width = (self.range.max_x - self.range.min_x) as usize + 1;
        let x = self.range.min_x + (self.current % width) as u32;
        let y = self.range.min_y + (self.current / width) as u32;

        self.current += 1;

        Some(TileCoord {
            x,
            y,
            zoom: self.range.zoom,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.range.len() - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileRangeIterator {
    fn len(&self) -> usize {
        self.range.len() - self.current
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Zoom level is outside valid range
    InvalidZoom(u8),
    /// Tile edge length must be a positive number of pixels
    InvalidTileSize(u32),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between {} and {})",
                    zoom, MIN_ZOOM, MAX_ZOOM
                )
            }
            CoordError::InvalidTileSize(size) => {
                write!(f, "Invalid tile size: {} (must be greater than 0)", size)
            }
        }
    }
}

impl std::error::Error for CoordError {}
