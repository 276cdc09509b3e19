// Write performance benchmarks for resultstore

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use resultstore::{FieldDef, Options, ResultTable, ScalarType, Schema, TableDef, Value};
use std::hint::black_box;
use tempfile::TempDir;

fn def() -> TableDef {
    let schema = Schema::new(vec![
        FieldDef::scalar("ID", ScalarType::Int64),
        FieldDef::array("T", ScalarType::Float64, 3),
        FieldDef::array("R", ScalarType::Float64, 3),
    ]);
    TableDef::new("/RESULT/NODAL", "DISPLACEMENT", &schema).unwrap()
}

fn records(size: usize) -> Vec<Vec<Value>> {
    let mut rng = rand::rng();
    (0..size)
        .map(|i| {
            let mut raw = vec![Value::Int(i as i64), Value::Int(0)];
            raw.extend((0..6).map(|_| Value::Float(rng.random::<f64>())));
            raw
        })
        .collect()
}

fn options() -> Options {
    Options::default().sync_on_write(false)
}

fn benchmark_domain_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain_write");

    for size in [100, 1000, 10000].iter() {
        let batch = records(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let mut table = ResultTable::open(temp_dir.path(), def(), &options()).unwrap();
                black_box(table.write(batch).unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalize");

    // Same entity layout in every domain, so all blocks deduplicate
    for domains in [10, 100].iter() {
        let batch = records(1000);
        group.throughput(Throughput::Elements(*domains as u64));
        group.bench_with_input(BenchmarkId::from_parameter(domains), domains, |b, &domains| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let mut table = ResultTable::open(temp_dir.path(), def(), &options()).unwrap();
                for _ in 0..domains {
                    table.write(&batch).unwrap();
                }
                table.finalize().unwrap();
                black_box(&table);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_domain_write, benchmark_finalize);
criterion_main!(benches);
