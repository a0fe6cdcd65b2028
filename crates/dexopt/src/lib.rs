//! Whole-program DEX bytecode optimizer.
//!
//! The crate models method bodies as streams of typed instructions over
//! virtual registers, with a packed (encoded) and a materialized (editable)
//! representation connected by `balloon` and `sync`. Optimization passes are
//! composed by a [`pass::PassManager`]; the central pass is the
//! [`peephole::PeepholePass`], which rewrites small local instruction
//! patterns into cheaper equivalents from a fixed, declarative rule
//! catalogue.

pub mod config;
pub mod dex;
pub mod error;
pub mod pass;
pub mod peephole;

pub use config::JsonConfig;
pub use error::{Error, Result};
pub use pass::{Pass, PassManager, PassStats};
pub use peephole::{PeepholePass, RuleCatalogue};
