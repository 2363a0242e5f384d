//! Remote backends for the allocation form.

pub mod rest;

pub use rest::RestBackend;
