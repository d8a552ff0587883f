use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health from /health")]
    Ping,

    #[command(about = "Show server information from the API root endpoint")]
    Info,
}

pub async fn handle(
    cmd: ServerCommands,
    server: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    match cmd {
        ServerCommands::Ping => {
            let url = format!("{}/health", server);
            let response = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("failed to reach {}", url))?;
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    let db = body["data"]["database"].as_str().unwrap_or("unknown");
                    println!("{} -> {} (database: {})", url, status, db);
                }
            }
            if !status.is_success() {
                anyhow::bail!("server is degraded ({})", status);
            }
            Ok(())
        }
        ServerCommands::Info => {
            let url = format!("{}/", server);
            let body: Value = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("failed to reach {}", url))?
                .json()
                .await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    let data = &body["data"];
                    println!(
                        "{} {}",
                        data["name"].as_str().unwrap_or("unknown"),
                        data["version"].as_str().unwrap_or("")
                    );
                    if let Some(endpoints) = data["endpoints"].as_object() {
                        for (name, path) in endpoints {
                            println!("  {:<20} {}", name, path.as_str().unwrap_or(""));
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
