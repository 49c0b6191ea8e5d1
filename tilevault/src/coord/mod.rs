//! Coordinate conversion module
//!
//! Provides the spherical Web Mercator projection used by slippy-map tile
//! providers: geographic coordinates to projected pixels, pixels to tile
//! indices, and the inclusive tile range covering a bounding box.

mod types;

pub use types::{
    CoordError, LatLng, LatLngBounds, Point, TileCoord, TileRange, TileRangeIterator, MAX_LAT,
    MAX_LNG, MAX_ZOOM, MIN_LAT, MIN_LNG, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Edge length of the projection's reference tile in pixels.
///
/// Pixel space at zoom `z` spans `BASE_TILE_SIZE * 2^z` pixels on each axis,
/// independent of the tile size a particular layer serves.
pub const BASE_TILE_SIZE: u32 = 256;

/// Size of the projected world in pixels at the given zoom level.
#[inline]
pub fn world_size(zoom: u8) -> f64 {
    BASE_TILE_SIZE as f64 * 2.0_f64.powi(zoom as i32)
}

/// Projects a geographic position into pixel space at `zoom`.
///
/// Latitude is clamped to the Web Mercator limits; longitude is not
/// wrapped, so positions east of the antimeridian project past the
/// world's right edge.
pub fn project(position: LatLng, zoom: u8) -> Result<Point, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let lat = position.lat.clamp(MIN_LAT, MAX_LAT);
    let size = world_size(zoom);

    let x = (position.lng + 180.0) / 360.0 * size;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;

    Ok(Point { x, y })
}

/// Computes the inclusive range of tiles covering `bounds` at `zoom`.
///
/// Both corners are projected, divided by `tile_size` and floored. The
/// result is clamped to the valid index range `[0, 2^z - 1]` so that
/// bounds touching or crossing the world edge never produce tiles that do
/// not exist.
pub fn tile_range(bounds: &LatLngBounds, zoom: u8, tile_size: u32) -> Result<TileRange, CoordError> {
    if tile_size == 0 {
        return Err(CoordError::InvalidTileSize(tile_size));
    }

    let north_west = project(bounds.north_west(), zoom)?;
    let south_east = project(bounds.south_east(), zoom)?;

    let size = tile_size as f64;
    let max_index = ((world_size(zoom) / size).ceil() as i64 - 1).max(0);
    let to_index = |pixel: f64| ((pixel / size).floor() as i64).clamp(0, max_index) as u32;

    Ok(TileRange {
        min_x: to_index(north_west.x),
        min_y: to_index(north_west.y),
        max_x: to_index(south_east.x),
        max_y: to_index(south_east.y),
        zoom,
    })
}
