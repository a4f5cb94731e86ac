//! API request and response data models.
//!
//! These structures define the public relay contract: what the browser client
//! sends and what it gets back. They are distinct from the wire types used to
//! talk to the external reconstruction service, which live with the
//! [`crate::reconstruction`] client.
//!
//! All models are annotated with `utoipa` for automatic API docs.

pub mod convert;
