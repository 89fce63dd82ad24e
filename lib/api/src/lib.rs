//! # photonest API
//!
//! REST surface for the photonest photo service. The engine itself never
//! sees HTTP types; this crate translates between the JSON transport and
//! the core/storage call contracts.

pub mod rest;

pub use rest::{ApiContext, RestApi};
