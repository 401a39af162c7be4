//! HTTP handlers and error mapping

mod auth;
mod error;
mod health;
mod inspecciones;

pub use auth::{login, logout, register};
pub use error::ApiError;
pub use health::health;
pub use inspecciones::{reporte15, submit};
