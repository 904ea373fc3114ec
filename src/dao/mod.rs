/// Record and player model definitions shared by every backend.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Backing stores for the players and predictions tables.
pub mod survey_store;
