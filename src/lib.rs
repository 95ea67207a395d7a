pub mod auth;
pub mod catalog;
pub mod config;
pub mod context;
pub mod data_types;
pub mod datasets;
pub mod frontend;
pub mod ingest;
pub mod lifecycle;
pub mod media;
pub mod publish;
pub mod repository;
pub mod teardown;
pub mod uploads;
pub mod utils;
