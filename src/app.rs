use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::config;
use crate::data::{HnInfoService, InfoService};
use crate::hover;
use crate::net;
use crate::readstate::ReadStateStore;
use crate::storage;

const USAGE: &str = "refined-hn — Hacker News companion.\n\nCommands:\n  user <name>    Look up a user profile\n  item <id>      Look up a story or comment\n  prune          Drop expired read-state records\n\nFlags:\n  --version, -V  Show version and exit\n  --help,    -h  Show this help message";

/// Entry point for the companion binary. The page-side state machine lives
/// in the library; the binary exposes the same lookups and store
/// maintenance from the command line.
pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let mut stdout = std::io::stdout();
    run_command(&cfg, &args, &mut stdout)
}

pub fn run_command(cfg: &config::Config, args: &[String], out: &mut dyn Write) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("user") => {
            let name = args.get(1).context("usage: refined-hn user <name>")?;
            let info = info_service(cfg)?;
            let user = info.user_info(name)?;
            writeln!(out, "{}", hover::render_user_info(&user))?;
        }
        Some("item") => {
            let raw = args.get(1).context("usage: refined-hn item <id>")?;
            let id: i64 = raw
                .parse()
                .with_context(|| format!("invalid item id: {raw}"))?;
            let info = info_service(cfg)?;
            let item = info.item_info(id)?;
            writeln!(out, "{}", hover::render_item_info(&item))?;
        }
        Some("prune") => {
            let store = storage::Store::open(storage::Options {
                path: cfg.read_state.db_path.clone(),
            })
            .context("open storage")?;
            let mut read_state = ReadStateStore::with_ttl(&store, cfg.read_state.ttl);
            let removed = read_state.prune()?;
            writeln!(out, "pruned {removed} expired record(s)")?;
        }
        Some(other) => bail!("unknown command: {other}"),
        None => {
            writeln!(out, "{USAGE}")?;
        }
    }
    Ok(())
}

pub fn usage() -> &'static str {
    USAGE
}

fn info_service(cfg: &config::Config) -> Result<HnInfoService> {
    let client = net::Client::new(net::ClientConfig {
        user_agent: cfg.hn.user_agent.clone(),
        api_base: Some(cfg.hn.api_base.clone()),
        site_base: Some(cfg.hn.site_base.clone()),
        http_client: None,
    })
    .context("initialize client")?;
    Ok(HnInfoService::new(Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_with_db(path: std::path::PathBuf) -> config::Config {
        let mut cfg = config::Config::default();
        cfg.read_state.db_path = Some(path);
        cfg
    }

    #[test]
    fn no_command_prints_usage() {
        let cfg = config::Config::default();
        let mut out = Vec::new();
        run_command(&cfg, &[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("user <name>"));
        assert!(text.contains("prune"));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let cfg = config::Config::default();
        let mut out = Vec::new();
        let err = run_command(&cfg, &["frobnicate".into()], &mut out).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn item_requires_a_numeric_id() {
        let cfg = config::Config::default();
        let mut out = Vec::new();
        let err = run_command(&cfg, &["item".into(), "abc".into()], &mut out).unwrap_err();
        assert!(err.to_string().contains("invalid item id"));
    }

    #[test]
    fn prune_runs_against_an_empty_store() {
        let dir = tempdir().unwrap();
        let cfg = config_with_db(dir.path().join("state.db"));
        let mut out = Vec::new();
        run_command(&cfg, &["prune".into()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("pruned 0"));
    }
}
