pub mod output;
pub mod setup_cmd;
pub mod status_cmd;
pub mod sync_cmd;
