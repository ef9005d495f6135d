// Library entry point for photo-greeter
// Exposes modules for testing

pub mod api;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pages;
pub mod session;
pub mod store;
pub mod upload;
