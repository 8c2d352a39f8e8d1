use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use vector_batch::{
    benchmarking::{encode_grid_tile, NullHelper},
    coords::{WorldTileCoords, ZoomLevel},
    io::worker::{BufferWorker, InlineWorker},
    layer::options::LayerPrograms,
    tile::{ReadinessPolicy, TileData, TileGeometryRepresentation, TileParser},
};

// https://tile.openstreetmap.org/15/17425/11365.png
const MUNICH_COORDS: WorldTileCoords = WorldTileCoords {
    x: 17425,
    y: 11365,
    z: ZoomLevel::new(15),
};

fn bench_parse_tile(c: &mut Criterion) {
    let data = encode_grid_tile(64);

    c.bench_function("parse_tile", |b| {
        b.iter(|| TileParser::parse(MUNICH_COORDS, &data, None).unwrap())
    });
}

fn bench_load_tile(c: &mut Criterion) {
    let data = encode_grid_tile(64);
    let mut helper = NullHelper::default();
    let worker: Arc<dyn BufferWorker> = Arc::new(InlineWorker);
    let renderers = LayerPrograms::default()
        .build(&mut helper, &worker, &[])
        .unwrap();

    c.bench_function("load_tile", |b| {
        b.iter(|| {
            let mut tile =
                TileGeometryRepresentation::new(MUNICH_COORDS, ReadinessPolicy::WaitForAll);
            tile.load(TileData::Mvt(data.clone()), &renderers, None)
                .unwrap();
            tile.update(&mut helper, 0.0).unwrap();
            tile.dispose(&mut helper).unwrap();
        })
    });
}

criterion_group!(benches, bench_parse_tile, bench_load_tile);
criterion_main!(benches);
