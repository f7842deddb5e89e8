//! `mailer-router` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a routes file and print the dependency order.
//! - `send`     — send a JSON message through a named route.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mailer::{OptionSet, OptionSource, Outcome, RoutesFile};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mailer-router",
    about = "Compose and route mailer pipelines from a routes file",
    version
)]
struct Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "MAILER_LOG", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a routes file.
    Validate {
        /// Path to the routes JSON file.
        path: PathBuf,
    },
    /// Send a message through a route and print the result.
    Send {
        /// Path to the routes JSON file.
        path: PathBuf,
        /// Route to send through.
        route: String,
        /// The message, as JSON.
        #[arg(long, default_value = "{}")]
        message: String,
        /// Extra option as `key=value`; the value is parsed as JSON when it
        /// can be, otherwise kept as a string. Repeatable.
        #[arg(long = "option", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Validate { path } => {
            let file = RoutesFile::from_path(&path)?;
            match file.validate() {
                Ok(order) => {
                    println!("✅ Routes file is valid. Dependency order: {order:?}");
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Send {
            path,
            route,
            message,
            options,
        } => {
            let router = RoutesFile::from_path(&path)?.into_router()?;
            let message: Value =
                serde_json::from_str(&message).context("--message is not valid JSON")?;
            let extra: OptionSet = options.into_iter().collect();

            info!("sending through route '{route}'");
            match router.send(&route, message, &[OptionSource::Static(extra)]) {
                Ok(Outcome::Sent(message)) => {
                    println!("{}", serde_json::to_string_pretty(&message)?);
                }
                Ok(Outcome::Cancelled) => println!("cancelled"),
                Err(e) => bail!("route '{route}' failed: {e}"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_values_parse_as_json_when_possible() {
        assert_eq!(parse_option("retries=3").unwrap(), ("retries".into(), json!(3)));
        assert_eq!(
            parse_option("domain=example.com").unwrap(),
            ("domain".into(), json!("example.com"))
        );
        assert!(parse_option("novalue").is_err());
    }

    #[test]
    fn cli_parses_send_arguments() {
        let cli = Cli::try_parse_from([
            "mailer-router",
            "send",
            "routes.json",
            "welcome",
            "--message",
            r#"{"to":"a@example.com"}"#,
            "--option",
            "locale=fr",
        ])
        .unwrap();

        match cli.command {
            Command::Send { route, options, .. } => {
                assert_eq!(route, "welcome");
                assert_eq!(options, vec![("locale".to_owned(), json!("fr"))]);
            }
            Command::Validate { .. } => panic!("expected send"),
        }
    }
}
