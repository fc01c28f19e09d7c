//! Authenticated HTTP transport for the Carrie backend.

mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;
