//! Shared helpers

pub mod http;
