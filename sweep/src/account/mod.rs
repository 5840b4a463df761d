//! # Account module
//!
//! Module dedicated to account management. Everything revolves around
//! the [`config::AccountConfig`] structure, built once per run and
//! passed (immutable) to the engines of this crate.

pub mod config;

#[doc(inline)]
pub use config::AccountConfig;
