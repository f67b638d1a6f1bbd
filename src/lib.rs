pub mod app;
pub mod campaign;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod ingest;
pub mod models;
pub mod preflight;
pub mod store;
pub mod twiml;
pub mod version;
