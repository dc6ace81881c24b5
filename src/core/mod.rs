pub mod api;
pub mod formatter;
pub mod models;
pub mod settings;
pub mod store;
pub mod sync;
pub mod sync_log;
pub mod usage;
