//! Performance benchmarks for veritas
//!
//! These benchmarks measure the operations on the validation hot path and
//! the cost of extraction:
//! - Program lookup through the compile cache against cold compilation
//! - Native validation of valid and invalid values
//! - Extraction over a generated source tree
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench compile_cache
//! ```
//!
//! ## Expected Performance Characteristics
//!
//! ### Compile Cache
//! - A cached lookup avoids parsing and checking entirely
//! - A cold compile scales with rule length
//!
//! ### Validation
//! - Dominated by rule evaluation once programs are cached
//! - Invalid values pay for building the joined error
//!
//! ### Extraction
//! - Parsing with tree-sitter is the dominant cost
//! - Files are parsed in parallel with rayon

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use veritas::cel::Type;
use veritas::extract::extract_source;
use veritas::types::GlobPattern;
use veritas::{Context, Engine, Extractor, Validator, impl_record};

const RULE: &str = "self.size() > 3 && self.startsWith('id_') && !self.contains(' ')";

const MODELS: &str = r#"
/// @cel: self.age >= 18
pub struct Customer {
    #[validate("nonzero")]
    pub name: String,
    #[validate("nonzero,email")]
    pub email: String,
    pub age: i64,
    #[validate("dive,nonzero")]
    pub tags: Vec<String>,
}
"#;

pub struct Customer {
    pub name: String,
    pub email: String,
    pub age: i64,
    pub tags: Vec<String>,
}

impl_record!(Customer { name, email, age, tags });

/// Create a crate root with `count` modules, each declaring annotated structs
fn create_source_tree(count: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    fs::create_dir_all(&src).unwrap();

    let mut lib = String::new();
    for i in 0..count {
        lib.push_str(&format!("pub mod models{};\n", i));
        fs::write(src.join(format!("models{}.rs", i)), MODELS).unwrap();
    }
    fs::write(src.join("lib.rs"), lib).unwrap();
    temp_dir
}

fn customer_validator() -> Validator {
    let extraction = extract_source(Path::new("models.rs"), MODELS, module_path!()).unwrap();
    Validator::builder()
        .rule_sets(extraction.rule_sets)
        .native_type::<Customer>()
        .build()
        .unwrap()
}

// ============================================================================
// Compile Cache Benchmarks
// ============================================================================

/// Benchmark cached program lookup against compiling from scratch
fn bench_compile_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_cache");
    let engine = Engine::new();
    let env = engine
        .environment()
        .variable("self", Type::Dyn)
        .build()
        .unwrap();

    engine.compile(&env, RULE).unwrap();
    group.bench_function("cached", |b| {
        b.iter(|| black_box(engine.compile(&env, black_box(RULE)).unwrap()));
    });

    group.bench_function("cold", |b| {
        b.iter(|| {
            engine.cache().purge();
            black_box(engine.compile(&env, black_box(RULE)).unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Validation Benchmarks
// ============================================================================

/// Benchmark native validation throughput
fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let validator = customer_validator();
    let ctx = Context::background();

    for tag_count in [1usize, 10, 100] {
        let valid = Customer {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            age: 36,
            tags: (0..tag_count).map(|i| format!("tag{}", i)).collect(),
        };
        let invalid = Customer {
            name: String::new(),
            email: "nope".into(),
            age: 12,
            tags: vec![String::new(); tag_count],
        };

        group.throughput(Throughput::Elements(tag_count as u64));
        group.bench_with_input(BenchmarkId::new("valid", tag_count), &valid, |b, value| {
            b.iter(|| black_box(validator.validate(&ctx, value).is_ok()));
        });
        group.bench_with_input(BenchmarkId::new("invalid", tag_count), &invalid, |b, value| {
            b.iter(|| black_box(validator.validate(&ctx, value).unwrap_err().len()));
        });
    }

    group.finish();
}

// ============================================================================
// Extraction Benchmarks
// ============================================================================

/// Benchmark extraction over source trees of increasing size
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");

    for file_count in [10usize, 50, 100] {
        let temp_dir = create_source_tree(file_count);
        let extractor = Extractor::new("bench", temp_dir.path().join("src"))
            .include(vec![GlobPattern::new("**/*.rs")]);

        group.throughput(Throughput::Elements(file_count as u64));
        group.bench_with_input(BenchmarkId::new("files", file_count), &file_count, |b, _| {
            b.iter(|| black_box(extractor.extract().unwrap().rule_sets.len()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile_cache, bench_validation, bench_extraction);
criterion_main!(benches);
