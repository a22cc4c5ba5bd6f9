//! PG Closets CLI library.
//!
//! Holds the pieces of the `pgc` binary that other crates test against:
//! currently the file-backed [`storage::FileStorage`] behind the local cart.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod storage;

pub use storage::FileStorage;
