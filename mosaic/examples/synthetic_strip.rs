//! Example: Mosaic a synthetic strip of overlapping images
//!
//! Renders four overlapping views of a procedural scene, each shifted right
//! and slightly down, aligns them with block matching and composites the
//! result into memory. Reports the per-pair alignments and how closely the
//! mosaic reproduces the scene, failing if the deviation is too large.
//!
//! Logs go to the console and to `test_output/logs/`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example synthetic_strip
//! RUST_LOG=mosaic=debug cargo run --example synthetic_strip
//! ```

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use common::log_setup::setup_logging;
use mosaic::{
    BlockMatchConfig, BlockMatchFinder, MemoryRaster, MemorySink, Mosaic, MosaicConfig, RasterSource,
};

const IMAGE_WIDTH: usize = 400;
const IMAGE_HEIGHT: usize = 300;
const OVERLAP: u32 = 80;

/// Scene offset of each view.
const VIEW_OFFSETS: [(f64, f64); 4] = [(0.0, 0.0), (330.0, 2.5), (655.0, 4.0), (985.0, 3.25)];

const NODATA: f32 = -9999.0;

/// Largest acceptable mean deviation from the scene, in scene units.
const MAX_MEAN_ABS_ERROR: f64 = 2.0;

fn scene(x: f64, y: f64) -> f32 {
    let v = 500.0
        + 200.0 * (x * 0.045).sin() * (y * 0.031).cos()
        + 120.0 * (x * 0.013 + y * 0.021).sin()
        + 60.0 * ((x - 2.0 * y) * 0.007).cos();
    v as f32
}

fn view(offset: (f64, f64)) -> MemoryRaster {
    MemoryRaster::from_fn(IMAGE_WIDTH, IMAGE_HEIGHT, NODATA, |x, y| {
        scene(x as f64 + offset.0, y as f64 + offset.1)
    })
}

fn main() -> anyhow::Result<()> {
    setup_logging("info", "test_output/logs", "synthetic_strip").context("logging setup")?;

    let sources: Vec<Arc<dyn RasterSource>> = VIEW_OFFSETS
        .iter()
        .map(|&offset| Arc::new(view(offset)) as Arc<dyn RasterSource>)
        .collect();

    let config = MosaicConfig {
        overlap_width: OVERLAP,
        blend_margin: Some(OVERLAP / 2),
        ..Default::default()
    };
    let finder = BlockMatchFinder::new(BlockMatchConfig {
        grid_step: 12,
        ..Default::default()
    });

    let start = Instant::now();
    let mosaic = Mosaic::build(sources, &finder, &config)?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Planned");

    for (i, alignment) in mosaic.alignments().iter().enumerate() {
        let expected = (
            VIEW_OFFSETS[i + 1].0 - VIEW_OFFSETS[i].0,
            VIEW_OFFSETS[i + 1].1 - VIEW_OFFSETS[i].1,
        );
        tracing::info!(
            pair = %format!("{}-{}", i, i + 1),
            transform = %alignment.transform,
            inliers = alignment.inliers.len(),
            matches = alignment.correspondences.len(),
            expected_dx = expected.0,
            expected_dy = expected.1,
            "Alignment"
        );
    }

    let start = Instant::now();
    let mut sink = MemorySink::new();
    mosaic.write(&mut sink)?;
    let raster = sink.into_raster().context("sink was never started")?;
    tracing::info!(
        width = raster.width(),
        height = raster.height(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Mosaic rendered"
    );

    let origin = mosaic.plan().canvas_origin();
    let mut covered = 0usize;
    let mut abs_error = 0.0f64;
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            let v = *raster.get(x, y);
            if v == NODATA as f64 {
                continue;
            }
            let truth = scene((x as i32 + origin.x) as f64, (y as i32 + origin.y) as f64);
            abs_error += (v - truth as f64).abs();
            covered += 1;
        }
    }
    let mean_abs_error = abs_error / covered.max(1) as f64;
    tracing::info!(covered, mean_abs_error, "Compared against the scene");
    anyhow::ensure!(
        covered > raster.width() * raster.height() * 9 / 10,
        "only {covered} pixels covered"
    );
    anyhow::ensure!(
        mean_abs_error < MAX_MEAN_ABS_ERROR,
        "mean absolute error {mean_abs_error:.3} exceeds {MAX_MEAN_ABS_ERROR}"
    );
    Ok(())
}
