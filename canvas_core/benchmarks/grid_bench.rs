use std::time::Instant;

use canvas_core::{
    Camera, GridRect, GridStore, Palette, PixelSurface, RenderScheduler, Rgb, ScreenRect,
    Viewport,
};
use canvas_proto::{BatchUpdate, Pixel};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};

struct NullSurface;

impl PixelSurface for NullSurface {
    fn clear(&mut self, _color: Rgb) {}

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgb) {
        criterion::black_box((rect, color));
    }

    fn present(&mut self) {}
}

fn palette() -> Palette {
    Palette::new((0..16u8).map(|code| (code, Rgb::new(code * 16, 255 - code * 16, code))), 0)
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_apply");

    group.bench_function("pixels_1k", |b| {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let pixels: Vec<Pixel> = (0..1_000)
            .map(|_| Pixel::new(rng.gen_range(0..500), rng.gen_range(0..500), rng.gen_range(0..16)))
            .collect();
        b.iter_batched(
            || GridStore::new(500, 500, 0, 255),
            |mut store| {
                for pixel in &pixels {
                    store.apply_pixel(pixel);
                }
                store
            },
            BatchSize::LargeInput,
        );
    });

    for size in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, &size| {
            let batch = BatchUpdate {
                start_x: 10,
                start_y: 10,
                grid: vec![vec![3; size]; size],
            };
            b.iter_batched(
                || GridStore::new(500, 500, 0, 255),
                |mut store| store.apply_batch(&batch),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let palette = palette();
    let mut store = GridStore::new(500, 500, 0, 255);
    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..50_000 {
        store.apply_pixel(&Pixel::new(
            rng.gen_range(0..500),
            rng.gen_range(0..500),
            rng.gen_range(0..16),
        ));
    }

    for scale in [0.1f64, 1.0, 4.0] {
        group.bench_with_input(BenchmarkId::new("full", scale), &scale, |b, &scale| {
            let mut camera = Camera::new(8.0, 0.1, 25.0, 1.0, Viewport::new(1280.0, 720.0));
            camera.set_scale(scale);
            b.iter_batched(
                || RenderScheduler::new(std::time::Duration::ZERO),
                |mut scheduler| {
                    let (grid, version) = store.read();
                    scheduler.draw(Instant::now(), grid, version, &camera, &palette, &mut NullSurface)
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.bench_function("partial_single_cell", |b| {
        let camera = Camera::new(8.0, 0.1, 25.0, 1.0, Viewport::new(1280.0, 720.0));
        let mut scheduler = RenderScheduler::new(std::time::Duration::ZERO);
        let (grid, version) = store.read();
        scheduler.draw(Instant::now(), grid, version, &camera, &palette, &mut NullSurface);
        b.iter(|| {
            scheduler.invalidate_cells(GridRect::cell(20, 20));
            scheduler.draw(Instant::now(), grid, version, &camera, &palette, &mut NullSurface)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_apply, bench_draw);
criterion_main!(benches);
