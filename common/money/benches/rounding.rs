use criterion::{criterion_group, criterion_main, Criterion, black_box};
use bigdecimal::BigDecimal;
use std::str::FromStr;

use common_money::{format_two_decimals, parse_lenient};

fn bench_format(c: &mut Criterion) {
    let samples: Vec<BigDecimal> = [
        "1.005", "2.675", "0.005", "142.9", "12345", "19.90", "99999.99", "0.3349", "42.4242"
    ].into_iter().map(|s| BigDecimal::from_str(s).unwrap()).collect();
    c.bench_function("format_two_decimals", |b| {
        b.iter(|| {
            for v in &samples { black_box(format_two_decimals(v)); }
        });
    });
}

fn bench_parse_gateway_amounts(c: &mut Criterion) {
    let samples: Vec<String> = (0..500).map(|i| format!("{},{:03}.{:02}", i, i % 1000, i % 100)).collect();
    c.bench_function("parse_lenient_grouped", |b| {
        b.iter(|| {
            for s in &samples { let _ = black_box(parse_lenient(s)); }
        });
    });
}

criterion_group!(rounding, bench_format, bench_parse_gateway_amounts);
criterion_main!(rounding);
