use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bale_core::plugin::Loader;
use bale_parser::{parse, transform, TransformOptions};

fn synthetic_module(modules: usize) -> String {
    let mut source = String::new();
    for i in 0..modules {
        source.push_str(&format!("import {{ item{i} }} from './dep{i}';\n"));
    }
    source.push_str("import * as ns from 'pkg';\nimport './polyfill';\n");
    for i in 0..modules {
        source.push_str(&format!(
            "export const value{i}: number = item{i} + {i};\n"
        ));
    }
    source.push_str("export default async function main() {\n");
    for i in 0..modules {
        source.push_str(&format!("  await ns.consume(value{i});\n"));
    }
    source.push_str("}\n");
    source
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_module(10);
    let large = synthetic_module(500);

    c.bench_function("parse_small", |b| {
        b.iter(|| parse(black_box(&small), Loader::Ts))
    });
    c.bench_function("parse_large", |b| {
        b.iter(|| parse(black_box(&large), Loader::Ts))
    });
}

fn bench_transform(c: &mut Criterion) {
    let source = synthetic_module(200);
    let options = TransformOptions {
        loader: Loader::Ts,
        jsx: Default::default(),
        define: Default::default(),
    };
    c.bench_function("transform_typescript", |b| {
        b.iter(|| transform(black_box(&source), &options))
    });
}

criterion_group!(benches, bench_parse, bench_transform);
criterion_main!(benches);
