pub mod config;
pub mod discover;
pub mod display;
pub mod errors;
pub mod measure;
pub mod table;
pub mod types;
