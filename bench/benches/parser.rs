use criterion::{criterion_group, criterion_main, Criterion};
use fmtc::{lexer, parser, token::Token};
use std::hint::black_box;

static INPUT: &str = include_str!("../../formats/pe.fmt");

fn parser(tokens: &[Token]) {
    let root = parser::parse(tokens).unwrap();
    _ = black_box(root);
}

fn criterion_benchmark(c: &mut Criterion) {
    let tokens = lexer::tokenize(INPUT);

    c.bench_function("parser", |b| {
        b.iter(|| {
            black_box(parser(black_box(&tokens)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
