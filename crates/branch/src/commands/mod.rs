pub mod diff;
pub mod import;
pub mod import_all;
pub mod init;
pub mod status;
pub mod sync;
pub mod watch;
