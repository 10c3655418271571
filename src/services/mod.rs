// src/services/mod.rs
pub mod allocation;
pub mod cache;
pub mod calculations;
pub mod catalog;
pub mod db;
pub mod planner;
pub mod rate_engine;
