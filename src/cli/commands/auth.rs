use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Log in and print a bearer token")]
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAJAK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    #[command(about = "Show the identity behind a token")]
    Whoami {
        #[arg(long, env = "PAJAK_TOKEN", hide_env_values = true)]
        token: String,
    },
}

pub async fn handle(
    cmd: AuthCommands,
    server: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    match cmd {
        AuthCommands::Login { email, password } => {
            let url = format!("{}/auth/login", server);
            let response = client
                .post(&url)
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await
                .with_context(|| format!("failed to reach {}", url))?;
            let status = response.status();
            let body: Value = response.json().await?;

            if !status.is_success() {
                anyhow::bail!(
                    "login failed ({}): {}",
                    status,
                    body["error"].as_str().unwrap_or("unknown error")
                );
            }

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    // Token on its own line so it pipes cleanly into PAJAK_TOKEN
                    println!("{}", body["data"]["token"].as_str().unwrap_or(""));
                }
            }
            Ok(())
        }
        AuthCommands::Whoami { token } => {
            let url = format!("{}/api/auth/whoami", server);
            let response = client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .with_context(|| format!("failed to reach {}", url))?;
            let status = response.status();
            let body: Value = response.json().await?;

            if !status.is_success() {
                anyhow::bail!(
                    "whoami failed ({}): {}",
                    status,
                    body["error"].as_str().unwrap_or("unknown error")
                );
            }

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    let data = &body["data"];
                    println!(
                        "{} ({}) role={}",
                        data["name"].as_str().unwrap_or(""),
                        data["id"].as_str().unwrap_or(""),
                        data["role"].as_str().unwrap_or("")
                    );
                }
            }
            Ok(())
        }
    }
}
