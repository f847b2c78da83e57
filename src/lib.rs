//! # insight-aggregator
//!
//! Multi-tenant aggregator that periodically polls third-party analytics
//! providers (error tracking, session replay, crash reporting, mobile
//! analytics) on behalf of user-defined projects, normalizes each response
//! into a flat metric map, and persists the latest per-provider snapshot
//! against the project record. A REST API lets authenticated users manage
//! projects and read their snapshots; a background scheduler drives the
//! polling.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── Auth (auth/)
//!     │
//!     ├── ProjectService (service/)
//!     │
//!     ├── Scheduler (scheduler/)
//!     │     └── CollectorFactory (collector/)
//!     │           └── {sentry, clarity, embrace, appmetric}
//!     │
//!     └── PostgreSQL Persistence (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod scheduler;
pub mod service;
