//! Output formatters (human and JSONL) for `list` and `lint`

pub mod human;
pub mod jsonl;

pub use human::HumanFormatter;
pub use jsonl::JsonlFormatter;
