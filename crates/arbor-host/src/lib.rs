//! Backing-store abstraction for arbor.
//!
//! This crate defines the [`Host`] trait, the single interface through
//! which arbor trees read real storage and commit sinks write to it, plus
//! the [`TreePath`] vocabulary type.
//!
//! # Crate layout
//!
//! - [`path`]: normalized absolute paths ([`TreePath`]).
//! - [`host`]: the [`Host`] trait and [`Listing`].
//! - [`memory`]: [`MemoryHost`], an in-memory store.
//! - [`fs`]: [`FsHost`], a store rooted at a directory.
//! - [`error`]: the [`HostError`] enum returned by all of the above.

pub mod error;
pub mod fs;
pub mod host;
pub mod memory;
pub mod path;

pub use error::HostError;
pub use fs::FsHost;
pub use host::{Host, Listing};
pub use memory::MemoryHost;
pub use path::TreePath;
