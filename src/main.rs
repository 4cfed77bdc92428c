use clap::Parser;
use tickets_http::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up ENCRYPTION_KEY, BOT_STATE, etc.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = tickets_http::cli::run(cli).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
