//! PG Closets Storefront library.
//!
//! Server-backed cart API for the closet-door store. The binary in `main.rs`
//! wires configuration, tracing, and Sentry around [`routes::app`]; tests drive
//! the same router against the in-memory cart store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
