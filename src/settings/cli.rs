use crate::domain_model::TokenClass;
use clap::{Parser, Subcommand};

/// Operator tool for the token authority.
#[derive(Parser, Debug)]
#[command(name = "token-authority", version)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mint an access/refresh pair for a subject.
    Issue { subject: String },
    /// Check a token against signature, blacklist and session set.
    Validate {
        token: String,
        #[arg(long, default_value = "access")]
        class: TokenClass,
    },
    /// Blacklist one token for the rest of its lifetime.
    Revoke { token: String },
    /// Drop every session of a subject.
    RevokeAll { subject: String },
}
