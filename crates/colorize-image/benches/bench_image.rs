use colorize_image::{ops, Image, ImageSize};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn sample_image() -> Image<u8, 3> {
    Image::from_size_val(
        ImageSize {
            width: 1920,
            height: 1080,
        },
        127,
    )
    .unwrap()
}

fn bench_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("Image");

    let image = sample_image();
    let mut image_f32 = Image::<f32, 3>::from_size_val(image.size(), 0.0).unwrap();

    group.bench_function("cast_and_scale_f32", |b| {
        b.iter(|| {
            ops::cast_and_scale(black_box(&image), black_box(&mut image_f32), 1f32 / 255.).unwrap()
        })
    });

    let mut image_u8 = sample_image();

    group.bench_function("scale_and_quantize_u8", |b| {
        b.iter(|| {
            ops::scale_and_quantize_u8(black_box(&image_f32), black_box(&mut image_u8), 255.)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_image);
criterion_main!(benches);
