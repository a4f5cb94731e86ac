//! API layer for HTTP request handling and data models.
//!
//! This module contains the relay's HTTP surface, organized into:
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Conversion** (`/api/v1/convert`): the image-to-3D relay operation
//! - **Health** (`/healthz`): liveness check
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
