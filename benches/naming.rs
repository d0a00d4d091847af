//! Benchmarks for output naming and markup wrapping
//!
//! This benchmark measures:
//! - Stable vs unique fingerprinting over short and long utterances
//! - Markup wrapping with every option set

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use voicemix::fingerprint::FingerprintInput;
use voicemix::{apply_markup, FingerprintHasher, MarkupOptions, ProviderKind};

const SHORT: &str = "Welcome back to the show.";

fn long_text() -> String {
    "The quick brown fox jumps over the lazy dog while the narrator keeps reading. ".repeat(40)
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    let long = long_text();
    let stable = FingerprintHasher::stable();
    let unique = FingerprintHasher::unique();

    for (label, text) in [("short", SHORT), ("long", long.as_str())] {
        let input = FingerprintInput {
            text,
            prompt: Some("calm"),
            language: Some("en-us"),
            voice_id: Some("21m00Tcm4TlvDq8ikWAM"),
            provider: "elevenlabs",
        };
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("stable", label), &input, |b, input| {
            b.iter(|| stable.fingerprint(black_box(input)))
        });
        group.bench_with_input(BenchmarkId::new("unique", label), &input, |b, input| {
            b.iter(|| unique.fingerprint(black_box(input)))
        });
    }
    group.finish();
}

fn bench_markup(c: &mut Criterion) {
    let options = MarkupOptions::new()
        .with_prompt("calm and slow")
        .with_language("en-us")
        .with_temperature(0.8)
        .with_exaggeration(0.3)
        .with_prosody(Some("90%"), Some("low"));
    let escaped = options.clone().with_escape_attributes(true);

    c.bench_function("markup/raw", |b| {
        b.iter(|| apply_markup(black_box(SHORT), &options, ProviderKind::Resemble))
    });
    c.bench_function("markup/escaped", |b| {
        b.iter(|| apply_markup(black_box(SHORT), &escaped, ProviderKind::Resemble))
    });
    c.bench_function("markup/passthrough", |b| {
        b.iter(|| apply_markup(black_box(SHORT), &options, ProviderKind::Cartesia))
    });
}

criterion_group!(benches, bench_fingerprint, bench_markup);
criterion_main!(benches);
