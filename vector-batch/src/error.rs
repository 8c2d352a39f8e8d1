//! Errors which can happen in various parts of the library.

use lyon::tessellation::TessellationError;
use thiserror::Error;

use crate::{
    coords::WorldTileCoords, feature::GeometryKind, io::scheduler::ScheduleError,
    render::helper::HelperError,
};

#[derive(Error, Debug)]
pub enum Error {
    /// A geometry was handed to a batch or renderer of another kind.
    #[error("{found} geometry can not be used with a {expected} batch")]
    GeometryKindMismatch {
        expected: GeometryKind,
        found: GeometryKind,
    },
    /// The geometry type has no batch it could be routed to.
    #[error("unsupported geometry type {0}")]
    UnsupportedGeometry(&'static str),
    #[error("tessellation failed: {0:?}")]
    Tessellation(TessellationError),
    #[error("decoding tile {coords} failed: {reason}")]
    TileDecode {
        coords: WorldTileCoords,
        reason: String,
    },
    /// The tile representation was already disposed and can not be used anymore.
    #[error("tile representation {0} has been disposed")]
    Disposed(WorldTileCoords),
    /// A buffer job was dropped without completing.
    #[error("buffer job of generation {0} was lost")]
    JobLost(u64),
    #[error("scheduling buffer generation failed")]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Helper(#[from] HelperError),
}

impl From<TessellationError> for Error {
    fn from(e: TessellationError) -> Self {
        Error::Tessellation(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
