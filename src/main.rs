//! ACL check CLI
//!
//! Loads an ACL configuration and evaluates one request against it.

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_acl::{AclEngine, AclEngineConfig, AclRegistry, FilledChecklist};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// ACL checker for Sentinel
#[derive(Parser, Debug)]
#[command(name = "sentinel-acl-check")]
#[command(author = "Sentinel Contributors")]
#[command(version)]
#[command(about = "Evaluate Sentinel proxy ACLs against a request", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra `acl` declaration, may be repeated
    #[arg(long = "acl", value_name = "LINE")]
    acls: Vec<String>,

    /// Extra access rule, may be repeated
    #[arg(long = "rule", value_name = "LINE")]
    rules: Vec<String>,

    /// Print the parsed configuration and exit
    #[arg(long)]
    dump: bool,

    /// Client source address
    #[arg(long)]
    src: Option<IpAddr>,

    /// Request method
    #[arg(long, default_value = "GET")]
    method: String,

    /// Request URL
    #[arg(long, default_value = "http://localhost/")]
    url: String,

    /// Evaluate without a request
    #[arg(long)]
    no_request: bool,

    /// Authenticated user name
    #[arg(long)]
    user: Option<String>,

    /// Transaction annotation as key=value, may be repeated
    #[arg(long = "note", value_name = "KEY=VALUE", value_parser = parse_note)]
    notes: Vec<(String, String)>,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,
}

fn parse_note(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration: {}", config_path.display()))?;
        serde_json::from_str(&content).context("Failed to parse configuration")?
    } else {
        AclEngineConfig::default()
    };
    config.acls.extend(args.acls.iter().cloned());
    config.access.extend(args.rules.iter().cloned());

    let registry = AclRegistry::with_builtin_types()
        .context("Failed to register ACL types")?
        .install()
        .context("Failed to install ACL registry")?;
    let engine = AclEngine::new(registry, &config).context("Invalid ACL configuration")?;

    if args.dump {
        for line in engine.dump() {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut checklist = FilledChecklist::new();
    if let Some(src) = args.src {
        checklist = checklist.with_src(src);
    }
    if !args.no_request {
        checklist = checklist.with_request(&args.method, &args.url);
    }
    if let Some(user) = &args.user {
        checklist = checklist.with_user(user);
    }
    for (key, value) in &args.notes {
        checklist = checklist.with_note(key, value);
    }

    let decision = engine.decide(&mut checklist);
    if args.json {
        println!("{}", serde_json::to_string(&decision)?);
    } else {
        match &decision.matched_acl {
            Some(acl) => println!("{} ({})", decision.answer, acl),
            None => println!("{}", decision.answer),
        }
    }

    Ok(())
}
