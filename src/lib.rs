pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ingestor;
pub mod job_scheduling;
pub mod models;
pub mod observability;
pub mod runtime_settings;
pub mod services;
pub mod utils;
