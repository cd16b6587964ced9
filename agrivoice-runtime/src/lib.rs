pub mod config_store;
pub mod defaults;
pub mod files;
pub mod microphone;
pub mod secrets;
pub mod voice;
