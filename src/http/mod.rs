//! HTTP surface: routes, error mapping

pub mod routes;

pub use routes::{build_router, AppError};
