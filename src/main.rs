use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use match_forecast::config::{AppConfig, load_dotenv};
use match_forecast::logging::init_logging;
use match_forecast::{ForecastService, PredictionRequest};

const USAGE: &str = "usage: match_forecast [--db PATH] <train | predict HOME AWAY [--league L] [--match-id N] | info [--top N] | health>";

fn main() -> Result<()> {
    load_dotenv();
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(path) = flag_value(&args, "--db") {
        config.store.db_path = PathBuf::from(path);
    }
    let positional = positional_args(&args);
    let Some(command) = positional.first() else {
        return Err(anyhow!(USAGE));
    };

    let service = ForecastService::open(&config)
        .with_context(|| format!("open store {}", config.store.db_path.display()))?;

    match command.as_str() {
        "train" => {
            let report = service.fit();
            print_json(&json!({
                "report": report,
                "model": service.summary(5),
            }))?;
        }
        "predict" => {
            let (Some(home), Some(away)) = (positional.get(1), positional.get(2)) else {
                return Err(anyhow!(USAGE));
            };
            let league = flag_value(&args, "--league");
            match flag_value(&args, "--match-id") {
                Some(raw) => {
                    let match_id = raw
                        .trim()
                        .parse::<i64>()
                        .with_context(|| format!("invalid --match-id {raw:?}"))?;
                    let recorded = service.predict_match(&PredictionRequest {
                        match_id,
                        home_team: home.clone(),
                        away_team: away.clone(),
                        competition: league,
                    });
                    print_json(&recorded)?;
                }
                None => {
                    service.warm_start();
                    let prediction = service.predict(home, away, league.as_deref());
                    print_json(&prediction)?;
                }
            }
        }
        "info" => {
            let top = flag_value(&args, "--top")
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .unwrap_or(5);
            service.warm_start();
            print_json(&service.summary(top))?;
        }
        "health" => {
            print_json(&service.health())?;
        }
        other => return Err(anyhow!("unknown command {other:?}\n{USAGE}")),
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}

const VALUE_FLAGS: &[&str] = &["--db", "--league", "--match-id", "--top"];

fn flag_value(args: &[String], name: &str) -> Option<String> {
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

fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_and_positionals_are_separated() {
        let a = args(&["--db", "x.sqlite", "predict", "Lens", "Lille", "--league=Ligue 1"]);
        assert_eq!(flag_value(&a, "--db").as_deref(), Some("x.sqlite"));
        assert_eq!(flag_value(&a, "--league").as_deref(), Some("Ligue 1"));
        assert_eq!(positional_args(&a), args(&["predict", "Lens", "Lille"]));
    }

    #[test]
    fn missing_flag_value_is_none() {
        let a = args(&["info", "--top"]);
        assert_eq!(flag_value(&a, "--top"), None);
    }
}
