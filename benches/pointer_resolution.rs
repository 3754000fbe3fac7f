//! Criterion benchmarks for the pointer hot path
//!
//! Covers: snapping, the pure `reduce` step, tracker updates with an index
//! lookup, and filename generation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gaze_grid::grid::{filename_for, GazeCoordinate, GazeGrid, GazeIndex, IndexRow};
use gaze_grid::resolver::{reduce, GazeTracker, PointerSample, Viewport};

fn full_index(grid: &GazeGrid) -> GazeIndex {
    let mut index = GazeIndex::new();
    for (_, coord) in grid.iter() {
        index.upsert(IndexRow::new(filename_for(coord, 256, "webp"), coord));
    }
    index
}

/// Pointer path zig-zagging across a 400x400 container
fn samples(n: usize) -> Vec<PointerSample> {
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            PointerSample::new(400.0 * t, 200.0 + 180.0 * (t * 12.0).sin())
        })
        .collect()
}

fn bench_snap(c: &mut Criterion) {
    let mut group = c.benchmark_group("snap");
    for step in [1.0, 3.0, 5.0] {
        let grid = GazeGrid::new(-15.0, 15.0, step).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(step), &grid, |b, grid| {
            b.iter(|| grid.snap(black_box(7.4), black_box(-12.6)));
        });
    }
    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let grid = GazeGrid::new(-15.0, 15.0, 3.0).unwrap();
    let viewport = Viewport::new(400.0, 400.0);
    let path = samples(1_000);

    c.bench_function("reduce_1000_samples", |b| {
        b.iter(|| {
            let mut cell = grid.center();
            for sample in &path {
                cell = reduce(&grid, &viewport, cell, black_box(*sample)).cell();
            }
            cell
        });
    });
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_on_pointer");
    for step in [1.0, 3.0] {
        let grid = GazeGrid::new(-15.0, 15.0, step).unwrap();
        let index = full_index(&grid);
        let path = samples(1_000);
        group.bench_with_input(BenchmarkId::from_parameter(step), &path, |b, path| {
            b.iter(|| {
                let mut tracker = GazeTracker::new(grid.clone(), &index, Viewport::new(400.0, 400.0));
                let mut tickets = 0usize;
                for sample in path {
                    if tracker.on_pointer(black_box(*sample)).is_some() {
                        tickets += 1;
                    }
                }
                tickets
            });
        });
    }
    group.finish();
}

fn bench_filename(c: &mut Criterion) {
    c.bench_function("filename_for", |b| {
        b.iter(|| filename_for(black_box(GazeCoordinate::new(-7.5, 12.5)), 256, "webp"));
    });
}

criterion_group!(benches, bench_snap, bench_reduce, bench_tracker, bench_filename);
criterion_main!(benches);
