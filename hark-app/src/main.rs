//! `hark` — voice assistant front end.
//!
//! The capture → wake → segmentation pipeline is synchronous and runs on a
//! blocking task; the async runtime only hosts signal handling, so Ctrl-C
//! can clear the run flag while the pipeline blocks on audio.

mod assistant;
mod error;
mod playback;
mod recognizer;
mod search;
mod session;
mod settings;
mod tts;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use search::SearchProvider;

#[derive(Parser)]
#[command(name = "hark", version, about = "Wake-word voice assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive voice session loop.
    Run(settings::RunArgs),
    /// List audio input devices (default first).
    Devices,
    /// Run a standalone web search and print the formatted results.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        max_results: usize,
        #[arg(long, value_enum, default_value = "ddg")]
        provider: ProviderKind,
        /// Required for the brave provider only.
        #[arg(long, env = "BRAVE_API_KEY", hide_env_values = true, default_value = "")]
        brave_api_key: String,
        /// Country (brave) / region prefix (ddg).
        #[arg(long, default_value = "us")]
        country: String,
        /// Search language.
        #[arg(long, default_value = "en")]
        lang: String,
        /// Result freshness window (brave only).
        #[arg(long, default_value = "week")]
        freshness: String,
        /// Skip fetching each result page for article text.
        #[arg(long)]
        no_full_text: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    Ddg,
    Brave,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let running = Arc::new(AtomicBool::new(true));

            let flag = Arc::clone(&running);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c received, stopping after the current step");
                    flag.store(false, Ordering::SeqCst);
                }
            });

            tokio::task::spawn_blocking(move || session::Session::new(args, running)?.run())
                .await??;
        }

        Command::Devices => {
            let devices = hark_core::audio::device::list_input_devices();
            if devices.is_empty() {
                println!("no input devices found");
            }
            for name in devices {
                println!("{name}");
            }
        }

        Command::Search {
            query,
            max_results,
            provider,
            brave_api_key,
            country,
            lang,
            freshness,
            no_full_text,
        } => {
            let formatted = tokio::task::spawn_blocking(move || -> error::Result<String> {
                let provider: Box<dyn SearchProvider> = match provider {
                    ProviderKind::Ddg => {
                        let mut ddg = search::ddg::DuckDuckGoSearch::new()
                            .with_region(&format!("{country}-{lang}"));
                        if no_full_text {
                            ddg = ddg.without_full_text();
                        }
                        Box::new(ddg)
                    }
                    ProviderKind::Brave => {
                        let mut brave = search::brave::BraveSearch::new(brave_api_key)
                            .with_locale(&country, &lang)
                            .with_freshness(&freshness);
                        if no_full_text {
                            brave = brave.without_full_text();
                        }
                        Box::new(brave)
                    }
                };
                let results = provider.search(&query, max_results)?;
                Ok(search::format_results(&results))
            })
            .await??;
            print!("{formatted}");
        }
    }

    Ok(())
}
