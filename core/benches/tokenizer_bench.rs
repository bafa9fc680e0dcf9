use criterion::{criterion_group, criterion_main, Criterion};
use sift_core::tokenizer::tokenize;
use sift_core::{Normalization, Tokenizer};

const TEXT: &str = "Inverted indexes map every term to the documents containing it. \
    A TF-IDF scorer weighs how often a term occurs in one document (1 + ln tf) \
    against how rare it is across the corpus; 2024 numbers, symbols & Ünïcödé too.";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(64);
    c.bench_function("tokenize_raw", |b| b.iter(|| tokenize(&text).count()));
    let folded = Tokenizer::new(Normalization { lowercase: true, nfkc: true, stem: true });
    c.bench_function("tokenize_normalized", |b| b.iter(|| folded.terms(&text).count()));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
