//! Map view collaborator
//!
//! The save pipeline derives zoom levels and bounds from whatever map view
//! it is attached to. Front ends implement [`MapView`]; headless callers use
//! [`StaticView`].

use parking_lot::RwLock;

use crate::coord::LatLngBounds;

/// Read-only view of the map a save is launched from.
pub trait MapView: Send + Sync {
    /// Current zoom level.
    fn zoom(&self) -> u8;

    /// Currently visible area.
    fn bounds(&self) -> LatLngBounds;

    /// Maximum zoom configured on the map itself, if any.
    fn max_zoom(&self) -> Option<u8> {
        None
    }
}

/// A map view with a fixed (but updatable) position.
#[derive(Debug)]
pub struct StaticView {
    state: RwLock<(u8, LatLngBounds)>,
    max_zoom: Option<u8>,
}

impl StaticView {
    pub fn new(zoom: u8, bounds: LatLngBounds) -> Self {
        Self {
            state: RwLock::new((zoom, bounds)),
            max_zoom: None,
        }
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }

    /// Moves the view.
    pub fn set(&self, zoom: u8, bounds: LatLngBounds) {
        *self.state.write() = (zoom, bounds);
    }
}

impl MapView for StaticView {
    fn zoom(&self) -> u8 {
        self.state.read().0
    }

    fn bounds(&self) -> LatLngBounds {
        self.state.read().1
    }

    fn max_zoom(&self) -> Option<u8> {
        self.max_zoom
    }
}
