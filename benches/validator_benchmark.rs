use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bang::validator::{validate, Kind, DEFAULT_MAX};

fn validator_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let cases = [
        ("module", "blog", Kind::Module, 65),
        ("alphanum", "error404", Kind::AlphaNum, 100),
        ("keys", "post_title-2", Kind::Keys, DEFAULT_MAX),
        ("email", "someone@example.com", Kind::Email, DEFAULT_MAX),
        ("ip", "2001:db8::ff00:42:8329", Kind::Ip, 45),
        ("password", "Secret2024", Kind::Password, DEFAULT_MAX),
        ("username", "Jörg-Müller", Kind::Username, DEFAULT_MAX),
        ("int", "-9223372036854775808", Kind::Int, DEFAULT_MAX),
    ];

    for (name, value, kind, max) in cases {
        group.bench_function(name, |b| {
            b.iter(|| validate(black_box(value), kind, max));
        });
    }

    group.finish();
}

fn oversized_input_benchmark(c: &mut Criterion) {
    let long = "a".repeat(10_000);
    c.bench_function("validate_oversized", |b| {
        b.iter(|| validate(black_box(&long), Kind::Module, 65));
    });
}

criterion_group!(benches, validator_benchmark, oversized_input_benchmark);
criterion_main!(benches);
