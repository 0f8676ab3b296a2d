//! talent-rank crate
//!
//! This crate is an implementation detail of the `talent-rank` tool. This crate's API is fluid and may change without warning
//! and in a semver-incompatible way.

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[doc(hidden)]
pub mod cache;

#[doc(hidden)]
pub mod collectors;

#[doc(hidden)]
pub mod config;

#[doc(hidden)]
pub mod html;

#[doc(hidden)]
pub mod importer;

#[doc(hidden)]
pub mod model;

#[doc(hidden)]
pub mod score;

#[doc(hidden)]
pub mod store;

#[doc(hidden)]
pub mod sync;

#[doc(hidden)]
pub mod tasks;
