pub mod analysis;
pub mod api;
pub mod config;
pub mod controller;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod models;
pub mod places;
pub mod port;
pub mod records;
pub mod scoring;
pub mod session;
pub mod text;
