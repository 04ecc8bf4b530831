use anyhow::Context;
use clap::{Parser, Subcommand};
use libris_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "libris", version, about = "Libris library catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API until Ctrl-C
    Serve {
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
        /// Load the demo catalog at start-up
        #[arg(long)]
        seed: bool,
    },
    /// Print the effective settings as JSON (tokens are omitted)
    Settings,
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load Libris settings")?;

    match cli.command {
        Command::Serve { port, seed } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            settings.catalog.seed_demo_data |= seed;

            libris_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "libris serve");
            libris_app::run(settings).await
        }
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Openapi => {
            let registry = libris_app::registry(&settings);
            let spec = libris_http::router::merged_openapi(&registry);
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(())
        }
    }
}
