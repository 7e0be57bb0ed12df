pub mod app;
pub mod auth;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod mail;
pub mod settings;
pub mod system;
pub mod terminal;
