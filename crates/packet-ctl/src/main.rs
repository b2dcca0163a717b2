//! packet-ctl — stream URLs and local files through the transfer bridge.

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use packet_core::config::PacketConfig;

use cmd::fetch::FetchOptions;

fn print_usage() {
    println!("Usage: packet-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  fetch <url>     Stream a URL to stdout");
    println!("  cat <path>      Stream a local file to stdout");
    println!("  config          Print the effective configuration");
    println!("  config init     Write the default config file if missing");
    println!();
    println!("Fetch options:");
    println!("  -o <file>            Write the body to a file instead of stdout");
    println!("  --meta               Wait for response metadata and print it to stderr");
    println!("  --json               Print metadata as JSON (implies --meta)");
    println!("  --hash               Print the BLAKE3 digest of the body");
    println!("  --no-redirect        Refuse redirects instead of following them");
    println!("  --user <user:pass>   Answer authentication challenges with a credential");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: {})", PacketConfig::file_path().display());
}

fn init_logging(config: &PacketConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --config option
    let mut config_path: Option<PathBuf> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            config_path = Some(args.get(i).context("--config requires a value")?.into());
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => PacketConfig::load_from(path.clone())
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => match PacketConfig::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("warning: {e}, using defaults");
                PacketConfig::default()
            }
        },
    };
    init_logging(&config);

    match remaining.as_slice() {
        ["fetch", url, rest @ ..] => {
            let options = FetchOptions::parse(rest)?;
            cmd::fetch::cmd_fetch(&config, url, options).await
        }
        ["cat", path] => cmd::cat::cmd_cat(&config, path).await,
        ["config"] => cmd::config::cmd_show(&config),
        ["config", "init"] => cmd::config::cmd_init(),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
