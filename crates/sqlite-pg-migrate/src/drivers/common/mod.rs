//! Utilities shared by the drivers.
//!
//! - [`tls`]: TLS configuration for the PostgreSQL connection

pub mod tls;

pub use tls::SslMode;
