use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{issue_token, Credential};
use crate::client::MemoryClient;
use crate::config::{AppConfig, Environment};
use crate::fallback::ShellRenderer;
use crate::registrar::RouteTable;
use crate::server;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "tickets-http")]
#[command(about = "HTTP server for the tickets dashboard")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server (default)")]
    Serve,

    #[command(about = "Print the resolved route table without starting the server")]
    Routes,

    #[command(about = "Mint a development credential signed with ENCRYPTION_KEY")]
    Token {
        #[arg(long, help = "User id the credential is issued to")]
        id: String,

        #[arg(long = "scope", help = "OAuth scope to grant (repeatable)")]
        scopes: Vec<String>,

        #[arg(long, help = "Issue a service credential")]
        service: bool,

        #[arg(long, default_value_t = 24, help = "Lifetime in hours")]
        ttl_hours: i64,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = AppConfig::from_env()?;
            crate::logging::init(config.environment);
            tracing::info!("Starting tickets-http in {:?} mode", config.environment);

            let state = build_state(config)?;
            server::serve(state).await?;
        }
        Commands::Routes => {
            crate::logging::init(Environment::Development);
            let table = server::route_table()?;
            print_routes(&table, cli.json);
        }
        Commands::Token {
            id,
            scopes,
            service,
            ttl_hours,
        } => {
            let config = AppConfig::from_env()?;
            let mut credential = Credential::new(id, scopes, chrono::Duration::hours(ttl_hours));
            credential.service = service;

            let token = issue_token(&credential, &config.security)?;
            if cli.json {
                println!("{}", json!({ "token": token, "claims": credential }));
            } else {
                println!("{}", token);
            }
        }
    }
    Ok(())
}

/// Shared state for the server: the bot snapshot and the SPA shell come from
/// the paths in the asset configuration.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let client = match &config.assets.bot_state {
        Some(path) => MemoryClient::from_file(path)?,
        None => {
            tracing::warn!("BOT_STATE not set; serving with an empty bot state");
            MemoryClient::new()
        }
    };

    let spa = match &config.assets.spa_index {
        Some(path) => ShellRenderer::from_file(path)
            .with_context(|| format!("Failed to read SPA index {}", path.display()))?,
        None => ShellRenderer::default(),
    };

    Ok(AppState::new(config, Arc::new(client), Arc::new(spa))?)
}

fn print_routes(table: &RouteTable, json_output: bool) {
    if json_output {
        let routes: Vec<_> = table
            .routes
            .iter()
            .map(|r| {
                json!({
                    "method": r.method.as_str(),
                    "path": r.path,
                    "access": r.config.access.to_string(),
                    "source": r.source.to_string(),
                })
            })
            .collect();
        let skipped: Vec<_> = table
            .skipped
            .iter()
            .map(|s| {
                json!({
                    "method": s.method.as_str(),
                    "path": s.path,
                    "source": s.source.to_string(),
                    "shadowedBy": s.shadowed_by.to_string(),
                })
            })
            .collect();
        println!("{}", json!({ "routes": routes, "skipped": skipped }));
        return;
    }

    for route in &table.routes {
        println!(
            "{:<7} {:<36} {:<14} {}",
            route.method.as_str(),
            route.path,
            route.config.access.to_string(),
            route.source
        );
    }
    for skip in &table.skipped {
        println!(
            "skipped {} {} from {} (shadowed by {})",
            skip.method, skip.path, skip.source, skip.shadowed_by
        );
    }
}
