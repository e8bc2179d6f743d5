use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use biocarousel::{
    butter_bandpass, extract_band_powers, Bandpass, RelaxationScorer, WindowBuffer, WindowScorer,
};
use ndarray::Array2;
use std::f64::consts::PI;

const SFREQ: f64 = 250.0;

/// Default-sized window: 8 channels × 100 samples of theta + alpha.
fn window() -> Array2<f64> {
    Array2::from_shape_fn((8, 100), |(c, t)| {
        let ts = t as f64 / SFREQ;
        (2.0 * PI * 6.0 * ts + c as f64).sin() + 0.7 * (2.0 * PI * 10.0 * ts).sin()
    })
}

fn bench_design(c: &mut Criterion) {
    c.bench_function("butter_bandpass order 5 (1–50 Hz)", |b| {
        b.iter(|| black_box(butter_bandpass(black_box(5), 1.0, 50.0, SFREQ)))
    });
}

fn bench_filter(c: &mut Criterion) {
    let bp = Bandpass::design(1.0, 50.0, SFREQ, 5).unwrap();
    let w = window();
    c.bench_function("filtfilt [8×100]", |b| {
        b.iter(|| black_box(bp.apply(black_box(&w)).unwrap()))
    });
}

fn bench_band_powers(c: &mut Criterion) {
    let w = window();
    c.bench_function("band powers [8×100]", |b| {
        b.iter(|| black_box(extract_band_powers(black_box(&w), SFREQ).unwrap()))
    });
}

fn bench_evaluation(c: &mut Criterion) {
    let mut scorer = RelaxationScorer::new(1.0, 50.0, SFREQ, 5).unwrap();
    let mut buf = WindowBuffer::new(100, 8);
    let w = window();
    for col in w.columns() {
        buf.append(&col.to_vec());
    }
    c.bench_function("append + snapshot + score (one evaluation)", |b| {
        b.iter(|| {
            buf.append(&[0.5; 8]);
            let win = buf.snapshot_and_slide().unwrap();
            black_box(scorer.score(&win).unwrap())
        })
    });
}

criterion_group!(benches, bench_design, bench_filter, bench_band_powers, bench_evaluation);
criterion_main!(benches);
