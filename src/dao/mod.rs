//! Persistence layer: domain entities and the stores that hold them.

/// Match document storage and its backends.
pub mod match_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
