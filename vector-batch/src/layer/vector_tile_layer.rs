//! Draws the tiles of a vector tile source.

use std::{collections::HashSet, sync::Arc};

use crate::{
    coords::{WorldTileCoords, HALF_WORLD_SIZE},
    error::Result,
    io::worker::BufferWorker,
    layer::{frame_state::FrameState, options::VectorTileLayerOptions},
    render::{batch_renderer::BatchRenderers, helper::DrawHelper, uniforms::FrameUniforms},
    tile::{
        representation_cache::RepresentationCache,
        tile_geometry::{TileData, TileGeometryRepresentation, TileState},
    },
    util::math::Extent,
};

/// Keeps one [`TileGeometryRepresentation`] per loaded tile and draws the ones a frame needs.
///
/// Fetching tiles is up to the caller: [`missing_tiles`](Self::missing_tiles) lists the
/// tiles the last prepared frame could not draw, their content is handed over with
/// [`set_tile`](Self::set_tile).
pub struct VectorTileLayerRenderer<H: DrawHelper> {
    helper: H,
    options: VectorTileLayerOptions,
    worker: Arc<dyn BufferWorker>,
    renderers: BatchRenderers<H::Program>,
    tiles: RepresentationCache<TileGeometryRepresentation<H::Buffer>>,
    /// Tiles drawn by the next frame, ancestors before descendants.
    render_plan: Vec<WorldTileCoords>,
    required: HashSet<WorldTileCoords>,
    missing: Vec<WorldTileCoords>,
    fading: bool,
    start_time: Option<f64>,
}

impl<H: DrawHelper> VectorTileLayerRenderer<H> {
    pub fn new(
        mut helper: H,
        options: VectorTileLayerOptions,
        worker: Arc<dyn BufferWorker>,
    ) -> Result<Self> {
        let renderers = options
            .programs
            .build(&mut helper, &worker, &options.attributes)?;
        helper.set_post_processes(&options.post_processes);
        Ok(Self {
            helper,
            options,
            worker,
            renderers,
            tiles: RepresentationCache::new(),
            render_plan: Vec::new(),
            required: HashSet::new(),
            missing: Vec::new(),
            fading: false,
            start_time: None,
        })
    }

    pub fn helper(&self) -> &H {
        &self.helper
    }

    pub fn helper_mut(&mut self) -> &mut H {
        &mut self.helper
    }

    pub fn options(&self) -> &VectorTileLayerOptions {
        &self.options
    }

    pub fn tile(&self, coords: &WorldTileCoords) -> Option<&TileGeometryRepresentation<H::Buffer>> {
        self.tiles.get(coords)
    }

    pub fn has_tile(&self, coords: &WorldTileCoords) -> bool {
        self.tiles.contains(coords)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Loads the content of a tile. A tile which is already loaded keeps drawing its previous
    /// buffers until the new ones are built.
    pub fn set_tile(&mut self, coords: WorldTileCoords, data: TileData) -> Result<()> {
        let source_layers = self.options.source_layers.as_deref();
        if let Some(tile) = self.tiles.get_mut(&coords) {
            return tile.load(data, &self.renderers, source_layers);
        }

        let mut tile = TileGeometryRepresentation::new(coords, self.options.readiness);
        tile.load(data, &self.renderers, source_layers)?;
        self.tiles.insert(coords, tile);
        Ok(())
    }

    /// Disposes a tile and its buffers. Returns false if the tile was not loaded.
    pub fn release_tile(&mut self, coords: &WorldTileCoords) -> Result<bool> {
        match self.tiles.remove(coords) {
            Some(mut tile) => {
                tile.dispose(&mut self.helper)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Required tiles of the last prepared frame which could not be drawn.
    pub fn missing_tiles(&self) -> &[WorldTileCoords] {
        &self.missing
    }

    /// Whether a tile is still fading in or building buffers.
    pub fn needs_redraw(&self) -> bool {
        self.fading
            || self
                .tiles
                .iter()
                .any(|(_, tile)| tile.state() != TileState::Ready)
    }

    /// Picks up finished buffers and decides which tiles to draw.
    ///
    /// A required tile which is not renderable yet is replaced by its nearest renderable
    /// ancestor. Returns whether new buffers became current.
    #[tracing::instrument(skip_all)]
    pub fn prepare_frame(&mut self, frame: &FrameState) -> Result<bool> {
        let mut changed = false;
        for (_, tile) in self.tiles.iter_mut() {
            changed |= tile.update(&mut self.helper, frame.time)?;
        }

        let required = frame.required_tiles(frame.tile_zoom());
        let mut plan = Vec::new();
        let mut planned = HashSet::new();
        self.missing.clear();

        for coords in &required {
            self.tiles.touch(coords);
            if self.is_renderable(coords) {
                if planned.insert(*coords) {
                    plan.push(*coords);
                }
                continue;
            }

            self.missing.push(*coords);
            let fallback = coords
                .ancestors()
                .find(|ancestor| self.is_renderable(ancestor));
            if let Some(ancestor) = fallback {
                self.tiles.touch(&ancestor);
                if planned.insert(ancestor) {
                    plan.push(ancestor);
                }
            }
        }

        plan.sort_by_key(|coords| coords.z);
        self.render_plan = plan;
        self.required = required.into_iter().collect();
        Ok(changed)
    }

    fn is_renderable(&self, coords: &WorldTileCoords) -> bool {
        self.tiles.get(coords).map_or(false, |tile| tile.is_renderable())
    }

    /// Draws the tiles chosen by [`prepare_frame`](Self::prepare_frame), then evicts least
    /// recently used tiles beyond the cache size.
    #[tracing::instrument(skip_all)]
    pub fn render_frame(&mut self, frame: &FrameState) -> Result<H::Target> {
        let start_time = *self.start_time.get_or_insert(frame.time);
        let elapsed = ((frame.time - start_time) / 1000.0) as f32;
        let transition = self.options.transition;

        self.helper.prepare_draw(frame);
        self.fading = false;

        let world_width = 2.0 * HALF_WORLD_SIZE;
        for world in frame.worlds() {
            let offset_x = world as f64 * world_width;
            for coords in &self.render_plan {
                let Some(tile) = self.tiles.get_mut(coords) else {
                    continue;
                };
                let tile_extent = coords.extent();
                let render_extent = Extent::new(
                    tile_extent.min_x + offset_x,
                    tile_extent.min_y,
                    tile_extent.max_x + offset_x,
                    tile_extent.max_y,
                )
                .intersection(&frame.extent);
                if render_extent.is_empty() {
                    continue;
                }

                self.fading |= tile.is_fading(frame.time, transition);
                let alpha = tile.alpha(frame.time, transition) * frame.opacity;
                let uniforms = FrameUniforms::new(
                    frame,
                    elapsed,
                    &render_extent,
                    alpha,
                    &self.options.uniforms,
                );
                tile.render(&mut self.helper, &self.renderers, frame, &uniforms, offset_x)?;
            }
        }

        let target = self.helper.finalize_draw(frame);
        self.expire_cache()?;
        Ok(target)
    }

    fn expire_cache(&mut self) -> Result<()> {
        let mut keep = self.required.clone();
        keep.extend(self.render_plan.iter().copied());

        for (coords, mut tile) in self.tiles.expire(self.options.cache_size, &keep) {
            log::info!("evicting tile {coords}");
            tile.dispose(&mut self.helper)?;
        }
        Ok(())
    }

    /// Recompiles the programs with new options. All tiles are disposed and have to be set
    /// again.
    pub fn reset(&mut self, options: VectorTileLayerOptions) -> Result<()> {
        self.dispose_tiles()?;
        self.renderers = options
            .programs
            .build(&mut self.helper, &self.worker, &options.attributes)?;
        self.helper.set_post_processes(&options.post_processes);
        self.options = options;
        Ok(())
    }

    fn dispose_tiles(&mut self) -> Result<()> {
        for (_, mut tile) in self.tiles.drain() {
            tile.dispose(&mut self.helper)?;
        }
        self.render_plan.clear();
        self.required.clear();
        self.missing.clear();
        Ok(())
    }

    /// Disposes all tiles and hands the helper back.
    pub fn dispose(mut self) -> Result<H> {
        self.dispose_tiles()?;
        Ok(self.helper)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geo_types::point;

    use crate::{
        coords::{WorldTileCoords, HALF_WORLD_SIZE},
        feature::Feature,
        io::worker::InlineWorker,
        layer::{
            frame_state::{FrameState, ViewState},
            options::VectorTileLayerOptions,
            vector_tile_layer::VectorTileLayerRenderer,
        },
        render::uniforms::{UniformValue, GLOBAL_ALPHA, RENDER_EXTENT},
        testing::{encode_tile, RecordingHelper},
        tile::tile_geometry::{TileData, TileState},
    };

    fn layer(options: VectorTileLayerOptions) -> VectorTileLayerRenderer<RecordingHelper> {
        VectorTileLayerRenderer::new(RecordingHelper::default(), options, Arc::new(InlineWorker))
            .unwrap()
    }

    /// A 256 pixel viewport showing the whole world.
    fn world_frame(zoom: f64, time: f64) -> FrameState {
        let view = ViewState::new([0.0, 0.0], 2.0 * HALF_WORLD_SIZE / 256.0, 0.0, zoom);
        FrameState::new(view, [256.0, 256.0]).with_time(time)
    }

    fn root() -> WorldTileCoords {
        (0, 0, 0).into()
    }

    #[test]
    fn test_fade_in() {
        let mut layer = layer(VectorTileLayerOptions::default());
        layer
            .set_tile(root(), TileData::Mvt(encode_tile()))
            .unwrap();

        assert!(layer.prepare_frame(&world_frame(0.0, 0.0)).unwrap());
        assert_eq!(layer.tile(&root()).unwrap().state(), TileState::Ready);
        assert!(layer.missing_tiles().is_empty());

        let frame = world_frame(0.0, 125.0).with_opacity(0.5);
        layer.prepare_frame(&frame).unwrap();
        let draws = layer.render_frame(&frame).unwrap();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].float(GLOBAL_ALPHA), 0.25);
        assert!(layer.needs_redraw());

        let frame = world_frame(0.0, 250.0);
        layer.prepare_frame(&frame).unwrap();
        let draws = layer.render_frame(&frame).unwrap();
        assert_eq!(draws[2].float(GLOBAL_ALPHA), 1.0);
        assert!(!layer.needs_redraw());
    }

    #[test]
    fn test_ancestor_fallback() {
        let mut layer = layer(VectorTileLayerOptions::default().with_transition(0.0));
        let child: WorldTileCoords = (0, 0, 1).into();
        layer
            .set_tile(root(), TileData::Mvt(encode_tile()))
            .unwrap();
        layer
            .set_tile(child, TileData::Mvt(encode_tile()))
            .unwrap();

        let frame = world_frame(1.0, 0.0);
        layer.prepare_frame(&frame).unwrap();
        let missing: Vec<WorldTileCoords> =
            vec![(1, 0, 1).into(), (0, 1, 1).into(), (1, 1, 1).into()];
        assert_eq!(layer.missing_tiles(), missing.as_slice());

        let draws = layer.render_frame(&frame).unwrap();
        assert_eq!(draws.len(), 6);
        assert_eq!(
            draws[0].uniform(RENDER_EXTENT),
            &UniformValue::Vec4(root().extent().to_array())
        );
        assert_eq!(
            draws[3].uniform(RENDER_EXTENT),
            &UniformValue::Vec4(child.extent().to_array())
        );
    }

    #[test]
    fn test_cache_eviction() {
        let mut layer = layer(VectorTileLayerOptions::default().with_cache_size(1));
        let required: WorldTileCoords = (0, 0, 1).into();
        let unused = [WorldTileCoords::from((0, 0, 2)), (3, 3, 2).into()];
        for coords in [required, unused[0], unused[1]] {
            layer
                .set_tile(coords, TileData::Mvt(encode_tile()))
                .unwrap();
        }

        let frame = world_frame(1.0, 0.0);
        layer.prepare_frame(&frame).unwrap();
        layer.render_frame(&frame).unwrap();

        assert_eq!(layer.tile_count(), 1);
        assert!(layer.has_tile(&required));
        assert!(!layer.has_tile(&unused[0]));
        assert!(!layer.has_tile(&unused[1]));
        assert_eq!(layer.helper().live_buffers(), 6);
    }

    #[test]
    fn test_release_tile() {
        let mut layer = layer(VectorTileLayerOptions::default());
        layer
            .set_tile(
                root(),
                TileData::Features(vec![Feature::new(1, point!(x: 0.0, y: 0.0))]),
            )
            .unwrap();
        layer.prepare_frame(&world_frame(0.0, 0.0)).unwrap();
        assert_eq!(layer.helper().live_buffers(), 2);

        assert!(layer.release_tile(&root()).unwrap());
        assert!(!layer.release_tile(&root()).unwrap());
        assert_eq!(layer.helper().live_buffers(), 0);

        layer.prepare_frame(&world_frame(0.0, 10.0)).unwrap();
        assert_eq!(layer.missing_tiles(), &[root()]);
        assert!(layer.render_frame(&world_frame(0.0, 10.0)).unwrap().is_empty());
    }

    #[test]
    fn test_source_layer_filter() {
        let mut layer =
            layer(VectorTileLayerOptions::default().with_source_layers(vec!["pois".to_owned()]));
        layer
            .set_tile(root(), TileData::Mvt(encode_tile()))
            .unwrap();
        let tile = layer.tile(&root()).unwrap();
        assert_eq!(tile.batch().point_batch().len(), 1);
        assert!(tile.batch().polygon_batch().is_empty());
    }

    #[test]
    fn test_reset_disposes_tiles() {
        let mut layer = layer(VectorTileLayerOptions::default());
        layer
            .set_tile(root(), TileData::Mvt(encode_tile()))
            .unwrap();
        layer.prepare_frame(&world_frame(0.0, 0.0)).unwrap();

        layer.reset(VectorTileLayerOptions::default()).unwrap();
        assert_eq!(layer.tile_count(), 0);
        assert_eq!(layer.helper().programs.len(), 6);
        assert_eq!(layer.helper().live_buffers(), 0);
    }

    #[cfg(feature = "tokio-scheduler")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_worker() {
        use std::time::Duration;

        use crate::io::{scheduler::TokioScheduler, worker::ScheduledWorker};

        let worker = ScheduledWorker::new(TokioScheduler::current().unwrap());
        let mut layer = VectorTileLayerRenderer::new(
            RecordingHelper::default(),
            VectorTileLayerOptions::default(),
            Arc::new(worker),
        )
        .unwrap();
        layer
            .set_tile(root(), TileData::Mvt(encode_tile()))
            .unwrap();

        let frame = world_frame(0.0, 0.0);
        for _ in 0..200 {
            layer.prepare_frame(&frame).unwrap();
            if layer.tile(&root()).unwrap().state() == TileState::Ready {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(layer.tile(&root()).unwrap().buffers().is_ready());
        assert_eq!(layer.render_frame(&frame).unwrap().len(), 3);

        let helper = layer.dispose().unwrap();
        assert_eq!(helper.live_buffers(), 0);
    }
}
