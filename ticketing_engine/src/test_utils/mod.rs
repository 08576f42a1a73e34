//! Helpers for tests that need a real, migrated database and a payment gateway that does as it is told.
pub mod fixtures;
pub mod prepare_env;
pub mod scripted_gateway;
