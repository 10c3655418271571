// src/handlers/mod.rs
pub mod error;
pub mod plans;
pub mod schemes;
