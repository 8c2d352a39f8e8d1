//! The geometry and GPU buffers of a single tile.

use std::fmt;

use crate::{
    batch::mixed::MixedGeometryBatch,
    coords::WorldTileCoords,
    error::{Error, Result},
    feature::Feature,
    layer::frame_state::FrameState,
    render::{
        batch_renderer::{BatchRenderers, LayerBuffers, RebuildOutcome, DRAW_ORDER},
        helper::DrawHelper,
        transform::Transform,
        uniforms::FrameUniforms,
    },
    tile::tile_parser::TileParser,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// The first generation of buffers is being built.
    Loading,
    /// No rebuild is in flight.
    Ready,
    /// A later generation is being built, the previous buffers are still drawn.
    Rebuilding,
    Disposed,
}

/// When a tile whose buffers are only partially built may be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessPolicy {
    /// Only after all three batches finished their first rebuild. A batch whose rebuild failed
    /// counts as finished and is left out of the drawing until a later rebuild succeeds.
    #[default]
    WaitForAll,
    /// As soon as any batch has buffers.
    Eager,
}

/// Content of a tile handed to the layer.
#[derive(Debug, Clone)]
pub enum TileData {
    /// Encoded Mapbox vector tile.
    Mvt(Vec<u8>),
    /// Features in world coordinates.
    Features(Vec<Feature>),
}

pub struct TileGeometryRepresentation<B> {
    coords: WorldTileCoords,
    state: TileState,
    batch: MixedGeometryBatch,
    buffers: LayerBuffers<B>,
    transform: Transform,
    readiness: ReadinessPolicy,
    /// Frame time at which the tile first became renderable.
    ready_time: Option<f64>,
}

impl<B: fmt::Debug> fmt::Debug for TileGeometryRepresentation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileGeometryRepresentation")
            .field("coords", &self.coords)
            .field("state", &self.state)
            .field("readiness", &self.readiness)
            .field("ready_time", &self.ready_time)
            .finish_non_exhaustive()
    }
}

impl<B> TileGeometryRepresentation<B> {
    pub fn new(coords: WorldTileCoords, readiness: ReadinessPolicy) -> Self {
        let [x, y] = coords.origin();
        Self {
            coords,
            state: TileState::Loading,
            batch: MixedGeometryBatch::new(),
            buffers: LayerBuffers::default(),
            // Tile local positions keep f32 precision at high zoom levels.
            transform: Transform::translation(-x, -y),
            readiness,
            ready_time: None,
        }
    }

    pub fn coords(&self) -> WorldTileCoords {
        self.coords
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state == TileState::Disposed
    }

    pub fn batch(&self) -> &MixedGeometryBatch {
        &self.batch
    }

    pub fn buffers(&self) -> &LayerBuffers<B> {
        &self.buffers
    }

    /// Maps world coordinates to the positions stored in the buffers.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn ready_time(&self) -> Option<f64> {
        self.ready_time
    }

    fn check_alive(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed(self.coords));
        }
        Ok(())
    }

    /// Replaces the content of the tile and rebuilds its buffers.
    ///
    /// Features with unsupported geometries are logged and left out.
    pub fn load<P>(
        &mut self,
        data: TileData,
        renderers: &BatchRenderers<P>,
        source_layers: Option<&[String]>,
    ) -> Result<()> {
        self.check_alive()?;

        let features = match data {
            TileData::Mvt(bytes) => TileParser::parse(self.coords, &bytes, source_layers)?,
            TileData::Features(features) => features,
        };

        self.batch.clear();
        for feature in features {
            let id = feature.id();
            if let Err(e) = self.batch.add_or_update(feature) {
                log::warn!("excluding feature {id} of tile {}: {e}", self.coords);
            }
        }
        self.rebuild(renderers)
    }

    /// Rebuilds the buffers of all three batches.
    pub fn rebuild<P>(&mut self, renderers: &BatchRenderers<P>) -> Result<()> {
        self.check_alive()?;

        for kind in DRAW_ORDER {
            let coords = self.coords;
            renderers.get(kind).rebuild(
                self.buffers.get_mut(kind),
                self.batch.batch(kind),
                &self.transform,
                move |outcome| {
                    if let RebuildOutcome::Failed(e) = outcome {
                        log::warn!("{kind} buffers of tile {coords} are outdated: {e}");
                    }
                },
            )?;
        }

        if self.state == TileState::Ready {
            self.state = TileState::Rebuilding;
        }
        Ok(())
    }

    /// Picks up finished buffers. `time` is the frame time in milliseconds.
    ///
    /// Returns whether new buffers became current.
    pub fn update<H>(&mut self, helper: &mut H, time: f64) -> Result<bool>
    where
        H: DrawHelper<Buffer = B>,
    {
        self.check_alive()?;

        let changed = self.buffers.poll(helper);
        if self.buffers.is_settled() {
            self.state = TileState::Ready;
        }
        if self.ready_time.is_none() && self.is_renderable() {
            self.ready_time = Some(time);
        }
        Ok(changed)
    }

    /// Whether the tile can be drawn according to its [`ReadinessPolicy`].
    pub fn is_renderable(&self) -> bool {
        match self.state {
            TileState::Disposed => false,
            TileState::Ready | TileState::Rebuilding => true,
            TileState::Loading => match self.readiness {
                ReadinessPolicy::WaitForAll => false,
                ReadinessPolicy::Eager => self.buffers.iter().any(|slot| slot.current().is_some()),
            },
        }
    }

    /// Opacity of the fade-in at `time`, `transition` is the fade duration in milliseconds.
    pub fn alpha(&self, time: f64, transition: f64) -> f32 {
        match self.ready_time {
            None => 0.0,
            Some(_) if transition <= 0.0 => 1.0,
            Some(ready_time) => ((time - ready_time) / transition).clamp(0.0, 1.0) as f32,
        }
    }

    /// Whether the fade-in is still running at `time`.
    pub fn is_fading(&self, time: f64, transition: f64) -> bool {
        self.ready_time.is_some() && self.alpha(time, transition) < 1.0
    }

    /// Draws fills, strokes and points of the tile.
    pub fn render<H>(
        &mut self,
        helper: &mut H,
        renderers: &BatchRenderers<H::Program>,
        frame: &FrameState,
        uniforms: &FrameUniforms,
        offset_x: f64,
    ) -> Result<()>
    where
        H: DrawHelper<Buffer = B>,
    {
        self.check_alive()?;

        for kind in DRAW_ORDER {
            let renderer = renderers.get(kind);
            let slot = self.buffers.get_mut(kind);
            renderer.pre_render(slot, frame);
            renderer.render(helper, slot, uniforms, offset_x)?;
        }
        Ok(())
    }

    /// Releases all GPU buffers. Every later call fails with [`Error::Disposed`].
    pub fn dispose<H>(&mut self, helper: &mut H) -> Result<()>
    where
        H: DrawHelper<Buffer = B>,
    {
        self.check_alive()?;

        self.buffers.release(helper);
        self.batch.clear();
        self.state = TileState::Disposed;
        Ok(())
    }
}
