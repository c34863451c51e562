use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use match_forecast::config::{AppConfig, load_dotenv};
use match_forecast::fake_history::{HistoryPlan, generate_history};
use match_forecast::logging::init_logging;
use match_forecast::store::aggregates::count_matches;
use match_forecast::store::{ConnectionManager, init_schema, upsert_matches};

fn main() -> Result<()> {
    load_dotenv();
    init_logging();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(path) = parse_arg("--db") {
        config.store.db_path = PathBuf::from(path);
    }
    let mut plan = HistoryPlan::default();
    if let Some(seed) = parse_arg("--seed").and_then(|raw| raw.parse::<u64>().ok()) {
        plan.seed = seed;
    }
    if let Some(seasons) = parse_arg("--seasons").and_then(|raw| raw.parse::<u32>().ok()) {
        plan.seasons = seasons.max(1);
    }

    let manager = ConnectionManager::open(&config.store);
    init_schema(&manager).context("create schema")?;

    let rows = generate_history(&plan);
    let written = upsert_matches(&manager, &rows).context("upsert generated matches")?;
    let total = count_matches(&manager).context("count matches")?;
    info!(generated = rows.len(), written, total, "history seeded");

    println!("Seeded {} matches into {}", rows.len(), config.store.db_path.display());
    println!("Matches in store: {total}");
    Ok(())
}

fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
