pub mod audio;
pub mod clip;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod persistence;
pub mod source;
pub mod store;
pub mod subtitle;
pub mod time;
