//! Per frame input of the layer renderers. The renderers never mutate it.

use serde::{Deserialize, Serialize};

use crate::{
    coords::{WorldTileCoords, ZoomLevel, HALF_WORLD_SIZE, MAX_ZOOM, ZOOM_BOUNDS},
    util::math::Extent,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Web Mercator meters.
    pub center: [f64; 2],
    /// Meters per CSS pixel.
    pub resolution: f64,
    /// Radians, counter-clockwise.
    pub rotation: f64,
    pub zoom: f64,
}

impl ViewState {
    pub fn new(center: [f64; 2], resolution: f64, rotation: f64, zoom: f64) -> Self {
        Self {
            center,
            resolution,
            rotation,
            zoom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewHints {
    pub animating: bool,
    pub interacting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub view: ViewState,
    /// Viewport size in CSS pixels.
    pub size: [f64; 2],
    pub pixel_ratio: f64,
    /// Milliseconds.
    pub time: f64,
    /// Visible part of the world.
    pub extent: Extent,
    pub hints: ViewHints,
    /// Opacity of the layer.
    pub opacity: f32,
    /// Whether the world repeats horizontally.
    pub wrap_x: bool,
}

impl FrameState {
    pub fn new(view: ViewState, size: [f64; 2]) -> Self {
        let extent = view_extent(&view, size);
        Self {
            view,
            size,
            pixel_ratio: 1.0,
            time: 0.0,
            extent,
            hints: ViewHints::default(),
            opacity: 1.0,
            wrap_x: false,
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_hints(mut self, hints: ViewHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_wrap_x(mut self, wrap_x: bool) -> Self {
        self.wrap_x = wrap_x;
        self
    }

    /// Neither animating nor interacting.
    pub fn is_idle(&self) -> bool {
        !self.hints.animating && !self.hints.interacting
    }

    /// Indices of the world copies overlapping the extent, `0` is the main world.
    pub fn worlds(&self) -> std::ops::RangeInclusive<i32> {
        if !self.wrap_x {
            return 0..=0;
        }
        let world_width = 2.0 * HALF_WORLD_SIZE;
        let start = ((self.extent.min_x + HALF_WORLD_SIZE) / world_width).floor() as i32;
        let end = ((self.extent.max_x - HALF_WORLD_SIZE) / world_width).ceil() as i32;
        start..=end
    }

    /// Zoom level of the tiles which cover this frame.
    pub fn tile_zoom(&self) -> ZoomLevel {
        let zoom = self.view.zoom.round().clamp(0.0, (MAX_ZOOM - 1) as f64);
        ZoomLevel::new(zoom as u8)
    }

    /// Tiles of `z` intersecting the frame extent, ordered by row and column.
    pub fn required_tiles(&self, z: ZoomLevel) -> Vec<WorldTileCoords> {
        // 2^31 tiles per axis at the deepest level, the last index still fits an i32.
        let last = i64::from(ZOOM_BOUNDS[u8::from(z) as usize]) - 1;
        let size = WorldTileCoords::from((0, 0, z)).size();
        let world = Extent::new(
            -HALF_WORLD_SIZE,
            -HALF_WORLD_SIZE,
            HALF_WORLD_SIZE,
            HALF_WORLD_SIZE,
        );
        let extent = self.extent.intersection(&world);
        if extent.is_empty() {
            return vec![];
        }

        let index = |offset: f64| ((offset / size).floor() as i64).clamp(0, last) as i32;
        let column = |x: f64| index(x + HALF_WORLD_SIZE);
        let row = |y: f64| index(HALF_WORLD_SIZE - y);

        let mut tiles = Vec::new();
        for y in row(extent.max_y)..=row(extent.min_y) {
            for x in column(extent.min_x)..=column(extent.max_x) {
                let coords = WorldTileCoords::from((x, y, z));
                // Tiles which only touch the extent are skipped.
                let overlap = coords.extent().intersection(&extent);
                if overlap.width() > 0.0 && overlap.height() > 0.0 {
                    tiles.push(coords);
                }
            }
        }
        tiles
    }
}

/// Bounding box of the rotated viewport.
fn view_extent(view: &ViewState, size: [f64; 2]) -> Extent {
    let half_width = view.resolution * size[0] / 2.0;
    let half_height = view.resolution * size[1] / 2.0;
    let (sin, cos) = view.rotation.sin_cos();
    let dx = (half_width * cos).abs() + (half_height * sin).abs();
    let dy = (half_width * sin).abs() + (half_height * cos).abs();
    let [x, y] = view.center;
    Extent::new(x - dx, y - dy, x + dx, y + dy)
}
