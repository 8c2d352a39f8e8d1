//! Provides utilities related to tile coordinates.

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::util::math::Extent;

/// Default extent of the inner coordinate system of a vector tile.
pub const EXTENT_UINT: u32 = 4096;
pub const EXTENT: f64 = EXTENT_UINT as f64;
pub const MAX_ZOOM: usize = 32;

/// Half the width of the Web Mercator world in meters.
pub const HALF_WORLD_SIZE: f64 = 20037508.342789244;

// Bounds are generated 0..=31
pub const ZOOM_BOUNDS: [u32; MAX_ZOOM] = create_zoom_bounds::<MAX_ZOOM>();

const fn create_zoom_bounds<const DIM: usize>() -> [u32; DIM] {
    let mut result: [u32; DIM] = [0; DIM];
    let mut i = 0;
    while i < DIM {
        result[i] = 2u32.pow(i as u32);
        i += 1;
    }
    result
}

#[derive(
    Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Debug, Default, Serialize, Deserialize,
)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const fn new(z: u8) -> Self {
        ZoomLevel(z)
    }

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::Sub<u8> for ZoomLevel {
    type Output = ZoomLevel;

    fn sub(self, rhs: u8) -> Self::Output {
        let zoom_level = self.0.checked_sub(rhs).expect("zoom level underflowed");
        ZoomLevel(zoom_level)
    }
}

impl Display for ZoomLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ZoomLevel {
    fn from(zoom_level: u8) -> Self {
        ZoomLevel(zoom_level)
    }
}

impl From<ZoomLevel> for u8 {
    fn from(val: ZoomLevel) -> Self {
        val.0
    }
}

/// Every tile has tile coordinates. These are
/// [Slippy map tile names](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames).
///
/// # Coordinate System Origin
///
/// The origin of the coordinate system is in the upper-left corner.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct WorldTileCoords {
    pub x: i32,
    pub y: i32,
    pub z: ZoomLevel,
}

impl WorldTileCoords {
    /// Get the tile which is one zoom level lower and contains this one
    pub fn get_parent(&self) -> Option<WorldTileCoords> {
        if self.z.is_root() {
            return None;
        }

        Some(WorldTileCoords {
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z - 1,
        })
    }

    /// Iterates over all ancestors, from the direct parent up to the root tile.
    pub fn ancestors(&self) -> impl Iterator<Item = WorldTileCoords> {
        std::iter::successors(self.get_parent(), |coords| coords.get_parent())
    }

    /// Width and height of this tile in Web Mercator meters.
    pub fn size(&self) -> f64 {
        2.0 * HALF_WORLD_SIZE / ZOOM_BOUNDS[self.z.0 as usize] as f64
    }

    /// Extent of this tile in Web Mercator meters. The y axis points north.
    pub fn extent(&self) -> Extent {
        let size = self.size();
        let min_x = -HALF_WORLD_SIZE + self.x as f64 * size;
        let max_y = HALF_WORLD_SIZE - self.y as f64 * size;
        Extent::new(min_x, max_y - size, min_x + size, max_y)
    }

    /// Lower-left corner of the tile, used as the origin of tile local coordinates.
    pub fn origin(&self) -> [f64; 2] {
        let extent = self.extent();
        [extent.min_x, extent.min_y]
    }
}

impl From<(i32, i32, ZoomLevel)> for WorldTileCoords {
    fn from(tuple: (i32, i32, ZoomLevel)) -> Self {
        WorldTileCoords {
            x: tuple.0,
            y: tuple.1,
            z: tuple.2,
        }
    }
}

impl From<(i32, i32, u8)> for WorldTileCoords {
    fn from(tuple: (i32, i32, u8)) -> Self {
        WorldTileCoords {
            x: tuple.0,
            y: tuple.1,
            z: ZoomLevel(tuple.2),
        }
    }
}

impl Display for WorldTileCoords {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "WT(x={x},y={y},z={z})", x = self.x, y = self.y, z = self.z)
    }
}
