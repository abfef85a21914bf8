pub mod init;
pub mod render;
pub mod sanitize;
pub mod serve;
