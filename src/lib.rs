//! # abcxform
//!
//! A pure Rust reader for the transform hierarchy of Alembic scene archives,
//! and the `abcxform` tool that dumps it.
//!
//! The dump prints, for every transform node, its decomposed operations, its
//! local matrix and its accumulated world matrix. Its output is meant to be
//! compared line by line against other Alembic implementations.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Ogawa container reading and writing
//! - Object hierarchy, metadata, time sampling and property access
//! - Transform schema decoding and matrix composition
//! - A writer for building transform hierarchies (fixtures and tests)
//!
//! ## Example
//!
//! ```no_run
//! use abcxform::{Archive, DumpConfig, dump_to_string};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let archive = Archive::open("scene.abc")?;
//! let text = dump_to_string(&archive, DumpConfig::new().with_filter("arm"))?;
//! print!("{}", text);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod dump;
pub mod error;
pub mod math;
pub mod ogawa;
pub mod writer;
pub mod xform;

pub use archive::{Archive, MetaData, Object, TimeSampling};
pub use dump::{DumpConfig, Dumper, dump_to_string};
pub use error::{Error, Result};
pub use math::M44d;
pub use xform::{SampleSelector, Xform, XformOp, XformOperationType, XformSample};
