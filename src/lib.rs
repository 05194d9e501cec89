pub mod classifier;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod generator;
pub mod readings;
pub mod report;
pub mod scheduler;
pub mod trigger;
