//! Command-line front end

pub mod commands;

pub use commands::{
    cmd_demo, cmd_mutate, cmd_read, cmd_serve, cmd_snapshot, cmd_wallet_new, cmd_wallet_show,
    spawn_stdin_approver, AppState, CliResult,
};
