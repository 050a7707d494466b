//! Command handlers, one module per subcommand.

pub mod completions;
pub mod doctor;
pub mod init;
pub mod keys;
pub mod open;
pub mod run;
