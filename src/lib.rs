pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod pagination;
pub mod query;
pub mod services;
pub mod session;
pub mod status;
pub mod storage;
pub mod validation;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use controller::{FetchOutcome, ListController, RawListController};
