// Adapters layer: concrete implementations for external systems.

pub mod auth;
pub mod sheets;
pub mod sqlite;
