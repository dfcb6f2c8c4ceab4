//! Core business logic for gifted.

pub mod services;

pub use services::*;
