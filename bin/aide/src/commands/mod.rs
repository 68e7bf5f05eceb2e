pub mod capabilities;
pub mod daemon;
pub mod heal;
pub mod init;
pub mod run_cmd;
pub mod status;
pub mod tasks_cmd;
