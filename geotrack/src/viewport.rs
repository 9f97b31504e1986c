//! Keeping a map camera and position marker in sync with the store.
//!
//! The map engine itself is external. [`Viewport`] is the two calls the
//! tracking core needs from it; [`ViewportSync`] decides when to make them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::MapDefaults;
use crate::fix::LocationFix;
use crate::store::FixListener;

/// The map engine, as seen from the tracking core.
pub trait Viewport: Send + Sync {
    /// Move the camera.
    fn center_on(&self, lng: f64, lat: f64, zoom: f64, animated: bool);

    /// Place or move the position marker.
    fn place_marker(&self, lng: f64, lat: f64);
}

/// Drives a [`Viewport`] from location fixes.
///
/// The first fix in the view's lifetime places the marker and flies the
/// camera to it. Later fixes only move the marker; the camera follows again
/// only on an explicit [`recenter`](Self::recenter).
pub struct ViewportSync {
    viewport: Arc<dyn Viewport>,
    defaults: MapDefaults,
    centered: AtomicBool,
}

impl std::fmt::Debug for ViewportSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportSync")
            .field("defaults", &self.defaults)
            .field("centered", &self.centered.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ViewportSync {
    pub fn new(viewport: Arc<dyn Viewport>, defaults: MapDefaults) -> Self {
        Self {
            viewport,
            defaults,
            centered: AtomicBool::new(false),
        }
    }

    /// Show the configured default area before any fix exists.
    pub fn show_default(&self) {
        self.viewport.center_on(
            self.defaults.center_lng,
            self.defaults.center_lat,
            self.defaults.default_zoom,
            false,
        );
    }

    /// Fly back to `fix` at the focus zoom.
    pub fn recenter(&self, fix: &LocationFix) {
        let (lng, lat) = fix.lng_lat();
        debug!(lng, lat, "Recentering on current location");
        self.viewport
            .center_on(lng, lat, self.defaults.focus_zoom, true);
    }

    /// Whether the initial camera transition already happened.
    pub fn has_centered(&self) -> bool {
        self.centered.load(Ordering::Acquire)
    }
}

impl FixListener for ViewportSync {
    fn on_fix_changed(&self, fix: &LocationFix) {
        let (lng, lat) = fix.lng_lat();
        self.viewport.place_marker(lng, lat);
        if !self.centered.swap(true, Ordering::AcqRel) {
            debug!(lng, lat, zoom = self.defaults.focus_zoom, "First fix, centering map");
            self.viewport
                .center_on(lng, lat, self.defaults.focus_zoom, true);
        }
    }
}

/// A call made on a [`RecordingViewport`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportCall {
    CenterOn {
        lng: f64,
        lat: f64,
        zoom: f64,
        animated: bool,
    },
    PlaceMarker {
        lng: f64,
        lat: f64,
    },
}

/// Viewport that records every call.
#[derive(Debug, Default)]
pub struct RecordingViewport {
    calls: Mutex<Vec<ViewportCall>>,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ViewportCall> {
        self.calls.lock().clone()
    }

    pub fn camera_moves(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ViewportCall::CenterOn { .. }))
            .count()
    }

    pub fn marker(&self) -> Option<(f64, f64)> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            ViewportCall::PlaceMarker { lng, lat } => Some((*lng, *lat)),
            ViewportCall::CenterOn { .. } => None,
        })
    }
}

impl Viewport for RecordingViewport {
    fn center_on(&self, lng: f64, lat: f64, zoom: f64, animated: bool) {
        self.calls.lock().push(ViewportCall::CenterOn {
            lng,
            lat,
            zoom,
            animated,
        });
    }

    fn place_marker(&self, lng: f64, lat: f64) {
        self.calls.lock().push(ViewportCall::PlaceMarker { lng, lat });
    }
}
