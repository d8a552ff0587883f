pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pajak")]
#[command(about = "Pajak CLI - Operator tooling for the tax administration API")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "PAJAK_API_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of the API server"
    )]
    pub server: String,

    #[arg(long, global = true, help = "Output raw JSON instead of text")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Server health and info")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Server { cmd } => commands::server::handle(cmd, &server, output_format).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, &server, output_format).await,
    }
}
