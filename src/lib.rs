pub mod app;
pub mod card;
pub mod config;
pub mod models;
pub mod selector;
pub mod store;
