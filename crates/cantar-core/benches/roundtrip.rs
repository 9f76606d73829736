//! Throughput benchmarks for create, extract and tree-hash.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Cursor;
use tempfile::TempDir;

use cantar_core::{
    create_archive, extract_archive, tree_hash, CreateOptions, ExtractOptions, HashOptions,
};

/// Builds a tree of `files` 4 KiB files spread over a few directories.
fn build_tree(files: usize) -> TempDir {
    let temp = TempDir::new().unwrap();
    let content = vec![0xABu8; 4096];
    for i in 0..files {
        let dir = temp.path().join(format!("dir_{:02}", i % 8));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("file_{i:05}.bin")), &content).unwrap();
    }
    temp
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");
    for files in [32usize, 256] {
        let tree = build_tree(files);
        group.throughput(Throughput::Bytes((files * 4096) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), &files, |b, _| {
            b.iter(|| {
                let mut out = Vec::new();
                create_archive(tree.path(), &mut out, &CreateOptions::default()).unwrap();
                black_box(out.len())
            });
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for files in [32usize, 256] {
        let tree = build_tree(files);
        let mut tarball = Vec::new();
        create_archive(tree.path(), &mut tarball, &CreateOptions::default()).unwrap();
        group.throughput(Throughput::Bytes(tarball.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), &files, |b, _| {
            b.iter(|| {
                let dest = TempDir::new().unwrap();
                let report = extract_archive(
                    Cursor::new(&tarball),
                    dest.path(),
                    &ExtractOptions::default(),
                )
                .unwrap();
                black_box(report.files_written)
            });
        });
    }
    group.finish();
}

fn bench_tree_hash(c: &mut Criterion) {
    let tree = build_tree(256);
    let mut tarball = Vec::new();
    create_archive(tree.path(), &mut tarball, &CreateOptions::default()).unwrap();

    let mut group = c.benchmark_group("tree_hash");
    group.throughput(Throughput::Bytes(tarball.len() as u64));
    group.bench_function("sha1_256_files", |b| {
        b.iter(|| black_box(tree_hash(Cursor::new(&tarball), &HashOptions::default()).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_create, bench_extract, bench_tree_hash);
criterion_main!(benches);
