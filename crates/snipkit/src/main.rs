//! snipkit CLI - component marketplace server and snippet previewer.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "snipkit")]
#[command(about = "Share, sanitize and preview UI component snippets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to snipkit.toml config file
    #[arg(short, long, default_value = "snipkit.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default snipkit.toml and an example snippet
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the marketplace API server
    Serve {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Render snippet files to HTML previews
    Render {
        /// Snippet file or directory of snippets
        path: PathBuf,

        /// Directory to write `<name>.html` previews into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Re-render snippets when they change
        #[arg(short, long)]
        watch: bool,

        /// Run without sandbox limits (trusted snippets only)
        #[arg(long)]
        trusted: bool,
    },

    /// Rewrite a snippet into a renderable component via the completion API
    Sanitize {
        /// Snippet file to sanitize
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Serve { port, host } => {
            let config = config::load(&cli.config)?;
            commands::serve::run(config, host, port).await?;
        }
        Commands::Render {
            path,
            output,
            watch,
            trusted,
        } => {
            let config = config::load(&cli.config)?;
            let options = commands::render::RenderOptions {
                output,
                trusted,
                limits: config.sandbox,
            };
            if watch {
                commands::render::watch(path, options).await?;
            } else {
                commands::render::run(&path, &options)?;
            }
        }
        Commands::Sanitize { file, output } => {
            let config = config::load(&cli.config)?;
            commands::sanitize::run(&config, &file, output.as_deref()).await?;
        }
    }

    Ok(())
}
