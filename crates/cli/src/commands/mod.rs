pub mod config_cmd;
pub mod init;
pub mod simulate;
