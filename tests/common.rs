//! Test utilities for veritas integration tests
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Result type alias for tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Extract Ok value or panic with context
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Extract Some value or panic with context
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(v) => v,
            None => panic!("assertion failed: expected Some, got None"),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Some(v) => v,
            None => panic!("{}: got None", $msg),
        }
    };
}

/// Source of a small crate whose types carry every kind of annotation
pub const MODELS_RS: &str = r#"
/// A registered user.
/// @cel: self.age >= 18
pub struct User {
    #[cfg_attr(any(), validate("nonzero"))]
    pub name: String,
    #[validate("nonzero,email")]
    pub email: String,
    pub age: i64,
    #[validate("required")]
    pub id: Option<i64>,
}

pub struct Matrix {
    #[validate("dive,dive,nonzero")]
    pub rows: Vec<Vec<i64>>,
}
"#;

pub const LIB_RS: &str = r#"
pub mod models;

/// @cel: self.value != null
pub struct Holder<T> {
    #[validate("required")]
    pub value: T,
}
"#;

/// Writes `files` (relative path, content) below `root`, creating parents
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// A crate named `shop` with `src/lib.rs` and `src/models.rs`
pub fn sample_crate() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_files(
        temp_dir.path(),
        &[
            (
                "Cargo.toml",
                "[package]\nname = \"shop\"\nversion = \"0.1.0\"\nedition = \"2024\"\n",
            ),
            ("src/lib.rs", LIB_RS),
            ("src/models.rs", MODELS_RS),
        ],
    );
    temp_dir
}
