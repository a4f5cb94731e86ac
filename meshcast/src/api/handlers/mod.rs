//! HTTP request handlers.
//!
//! Each handler is responsible for request validation, invoking the
//! reconstruction client, and response serialization. Handlers return
//! [`crate::errors::Error`] which converts to appropriate HTTP status codes
//! and JSON error responses.

pub mod convert;
