use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use neuropath::classifier::Preprocessor;
use neuropath::{Classifier, ImagePreprocessor, InferenceInput, LabelCatalog, TabularPreprocessor};

fn image_input(size: u32) -> InferenceInput {
    let img = RgbImage::from_fn(size, size, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    InferenceInput::new(buf).with_file_name("scan.jpg")
}

fn csv_input(rows: usize, features: usize) -> InferenceInput {
    let mut csv = (1..=features).map(|i| format!("X{}", i)).collect::<Vec<_>>().join(",");
    csv.push_str(",y\n");
    for row in 0..rows {
        let values: Vec<String> = (0..features).map(|i| ((row * 13 + i * 7) % 500).to_string()).collect();
        csv.push_str(&values.join(","));
        csv.push_str(",1\n");
    }
    InferenceInput::new(csv.into_bytes()).with_file_name("eeg.csv")
}

fn bench_image_preprocessing(c: &mut Criterion) {
    let preprocessor = ImagePreprocessor::new();
    let mut group = c.benchmark_group("Image Preprocessing");

    // Configure sampling
    group.sample_size(30);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for size in [224u32, 512, 1024] {
        let input = image_input(size);
        group.bench_function(format!("{}px", size), |b| {
            b.iter(|| preprocessor.preprocess(black_box(&input)).unwrap())
        });
    }
    group.finish();
}

fn bench_tabular_preprocessing(c: &mut Criterion) {
    let preprocessor = TabularPreprocessor::new();
    let mut group = c.benchmark_group("Tabular Preprocessing");
    group.sample_size(50);

    for rows in [1usize, 100, 1000] {
        let input = csv_input(rows, 178);
        group.bench_function(format!("{}_rows", rows), |b| {
            b.iter(|| preprocessor.preprocess(black_box(&input)).unwrap())
        });
    }
    group.finish();
}

fn bench_fallback_classification(c: &mut Criterion) {
    let classifier = Classifier::builder()
        .with_name("eeg")
        .with_preprocessor(TabularPreprocessor::new())
        .with_catalog(LabelCatalog::eeg_severity())
        .with_model_path(std::env::temp_dir().join("neuropath-bench/eeg.onnx"))
        .unwrap()
        .build()
        .unwrap();
    let input = csv_input(100, 178);

    c.bench_function("classify_100_eeg_rows", |b| {
        b.iter(|| classifier.classify(black_box(&input)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_image_preprocessing,
    bench_tabular_preprocessing,
    bench_fallback_classification
);
criterion_main!(benches);
