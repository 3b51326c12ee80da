pub mod env;
pub mod err;
pub mod init;
pub mod monitoring;
pub mod reqwest_helper;
