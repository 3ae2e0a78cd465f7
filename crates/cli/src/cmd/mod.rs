mod export;
mod init;
mod release;
mod tools;

pub use export::cmd_export;
pub use init::cmd_init;
pub use release::cmd_release;
pub use tools::cmd_tools;
