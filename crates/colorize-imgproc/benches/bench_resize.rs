use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use colorize_image::{Image, ImageSize};
use colorize_imgproc::{interpolation::InterpolationMode, resize::resize_native};

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resize");

    let model_size = ImageSize {
        width: 224,
        height: 224,
    };

    for (width, height) in [(256, 224), (512, 448), (1024, 896)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let image_size = ImageSize {
            width: *width,
            height: *height,
        };

        let image = Image::<f32, 1>::from_size_val(image_size, 50.0).unwrap();
        let mut small = Image::<f32, 1>::from_size_val(model_size, 0.0).unwrap();
        let ab = Image::<f32, 2>::from_size_val([56, 56].into(), 1.0).unwrap();
        let mut ab_full = Image::<f32, 2>::from_size_val(image_size, 0.0).unwrap();

        for mode in [InterpolationMode::Area, InterpolationMode::Bilinear] {
            group.bench_with_input(
                BenchmarkId::new(format!("shrink_{mode:?}"), &parameter_string),
                &image,
                |b, i| b.iter(|| resize_native(black_box(i), black_box(&mut small), mode)),
            );
        }

        group.bench_with_input(
            BenchmarkId::new("enlarge_ab_bilinear", &parameter_string),
            &ab,
            |b, i| {
                b.iter(|| {
                    resize_native(
                        black_box(i),
                        black_box(&mut ab_full),
                        InterpolationMode::Bilinear,
                    )
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_resize);
criterion_main!(benches);
