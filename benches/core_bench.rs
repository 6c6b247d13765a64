//! Benchmarks for ghrewrite core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ghrewrite::core::document::{parse_documents, render_documents};
use ghrewrite::core::{parser, planner};
use ghrewrite::recipes::{Recipe, RecipeSpec};
use std::path::Path;

const WORKFLOW: &str = r#"
name: CI
on:
  push:
    branches: [main]
  pull_request:
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v3
      - uses: actions/setup-java@v3
        with:
          distribution: adopt
          java-version: 11
      - uses: actions/cache@v3
        with:
          path: ~/.gradle/caches
          key: gradle-${{ hashFiles('**/*.gradle*') }}
      - run: ./gradlew build
        env:
          TOKEN: ${{ secrets.OLD_TOKEN }}
  test:
    runs-on: ubuntu-latest
    needs: build
    steps:
      - uses: actions/checkout@v3
      - uses: actions/setup-node@v3
        with:
          node-version: 16
      - run: npm test
"#;

const CONFIG: &str = r#"
version: "1.0"
name: bench
recipes:
  - recipe: setup-java-adopt-openjdk-to-temurin
  - recipe: setup-java-upgrade-java-version
  - recipe: setup-node-upgrade-node-version
  - recipe: setup-java-caching
  - recipe: replace-secrets
    old-secret-name: OLD_TOKEN
    new-secret-name: NEW_TOKEN
  - recipe: find-missing-timeout
  - recipe: find-unpinned-actions
"#;

fn bench_blake3_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_string");
    for size in [64, 1024, 16384] {
        let input: String = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let hash = blake3::hash(black_box(input.as_bytes()));
                black_box(hash);
            });
        });
    }
    group.finish();
}

fn bench_yaml_roundtrip(c: &mut Criterion) {
    c.bench_function("yaml_parse_workflow", |b| {
        b.iter(|| {
            let docs = parse_documents(black_box(WORKFLOW)).unwrap();
            black_box(docs);
        });
    });

    let docs = parse_documents(WORKFLOW).unwrap();
    c.bench_function("yaml_render_workflow", |b| {
        b.iter(|| {
            let text = render_documents(black_box(&docs)).unwrap();
            black_box(text);
        });
    });
}

fn bench_plan_file(c: &mut Criterion) {
    let config = parser::parse_config(CONFIG).unwrap();
    let recipes: Vec<&dyn Recipe> = config.recipes.iter().map(RecipeSpec::recipe).collect();
    let rel = Path::new(".github/workflows/ci.yml");

    let mut group = c.benchmark_group("plan_file");
    for n in [1, 4, recipes.len()] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let plan =
                    planner::plan_file(&recipes[..n], Path::new("."), rel, WORKFLOW.to_string())
                        .unwrap();
                black_box(plan);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_blake3_string,
    bench_yaml_roundtrip,
    bench_plan_file
);
criterion_main!(benches);
