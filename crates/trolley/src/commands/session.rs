//! Session command - manages the persisted session token.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use serde::Serialize;
use trolley_expiry::SessionState;

use super::Context;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Store a session token issued by the login flow
    Login {
        /// Dot-separated token whose second segment holds the claims
        #[arg(long, env = "TROLLEY_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Forget the session token
    Logout,

    /// Check the stored token and show the session state
    Status,
}

/// Session state for JSON output.
#[derive(Debug, Serialize)]
struct SessionOutput {
    session: SessionState,
    logged_in: bool,
    user_id: Option<String>,
}

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    let mut coordinator = ctx.coordinator()?;

    match args.command {
        SessionCommand::Login { token } => {
            coordinator.login(&token)?;
        }
        SessionCommand::Logout => coordinator.logout(),
        SessionCommand::Status => {}
    }

    let state = coordinator.session_state();
    let output = SessionOutput {
        session: state,
        logged_in: state.is_logged_in(),
        user_id: coordinator.user_id().map(str::to_string),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        let status = if output.logged_in {
            Style::new().green().apply_to(format!("● {}", state))
        } else {
            Style::new().red().apply_to(format!("● {}", state))
        };
        println!();
        println!("  {} {}", dim.apply_to("Session:"), status);
        if let Some(ref id) = output.user_id {
            println!("  {} {}", dim.apply_to("User:"), id);
        }
        println!();
    }

    Ok(())
}
