use std::path::PathBuf;
use std::sync::Arc;

use analysis_core::{Candle, OptionChainSnapshot, OptionChainSource, TradingMode};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ml_client::MLConfig;
use serde::Serialize;
use signal_orchestrator::{
    CompositeSignal, EngineConfig, MarketContext, RuleBasedValidator, SignalEngine, TtlCandleCache,
};

mod input;

use input::{read_json, JsonDirSource};

#[derive(Serialize)]
struct BatchEntry {
    index: String,
    mode: TradingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal: Option<CompositeSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn arg_list(args: &[String], flag: &str) -> Vec<String> {
    match args.iter().position(|a| a == flag) {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  signal-cli --candles FILE [--chain FILE] [--index NIFTY] [--mode scalp]");
    eprintln!("  signal-cli --data-dir DIR --indices NIFTY BANKNIFTY [--mode scalp]");
    eprintln!("");
    eprintln!("Options:");
    eprintln!("  --context FILE      Market context JSON (evaluated_at, fii_dii, sectors, pre_market)");
    eprintln!("  --at RFC3339        Evaluation time when no context file is given (default: now)");
    eprintln!("  --rule-validator    Use the offline rule-based validator when LLM_VALIDATOR_URL is unset");
    eprintln!("");
    eprintln!("Environment: ML_PREDICTOR_URL, LLM_VALIDATOR_URL, ML_TIMEOUT_SECS, FUSION_*, AUTO_EXECUTE_*");
    std::process::exit(1);
}

fn load_context(args: &[String]) -> Result<MarketContext> {
    if let Some(path) = arg_value(args, "--context") {
        return read_json(&PathBuf::from(path));
    }
    let at = match arg_value(args, "--at") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --at timestamp {}", raw))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    Ok(MarketContext::at(at))
}

fn build_engine(args: &[String]) -> Result<SignalEngine> {
    let config = EngineConfig::from_env()?;
    let ml_config = MLConfig::from_env();
    let mut engine = SignalEngine::new(config);

    if let Some(predictor) = ml_config.predictor()? {
        tracing::info!("ML predictor: {:?}", ml_config.predictor_url);
        engine = engine.with_ml_predictor(Arc::new(predictor));
    } else {
        tracing::warn!("ML_PREDICTOR_URL not set, signals fall back to the technical vote");
    }

    if let Some(validator) = ml_config.validator()? {
        tracing::info!("LLM validator: {:?}", ml_config.validator_url);
        engine = engine.with_llm_validator(Arc::new(validator));
    } else if args.iter().any(|a| a == "--rule-validator") {
        tracing::info!("Using rule-based validator");
        engine = engine.with_llm_validator(Arc::new(RuleBasedValidator::default()));
    } else {
        tracing::warn!("No LLM validator configured");
    }

    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr so stdout carries only the JSON result
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args: Vec<String> = std::env::args().collect();
    let mode: TradingMode = arg_value(&args, "--mode").unwrap_or("scalp").parse()?;
    let context = load_context(&args)?;
    let engine = build_engine(&args)?;

    if let Some(path) = arg_value(&args, "--candles") {
        let index = arg_value(&args, "--index").unwrap_or("NIFTY");
        let candles: Vec<Candle> = read_json(&PathBuf::from(path))?;
        let chain: Option<OptionChainSnapshot> = arg_value(&args, "--chain")
            .map(|p| read_json(&PathBuf::from(p)))
            .transpose()?;

        let signal = engine
            .build_final_signal(&candles, chain.as_ref(), index, mode, &context)
            .await?;
        tracing::info!(
            "{} {}: {} -> {:?} ({:.0}% confidence)",
            index,
            mode,
            signal.signal,
            signal.final_decision,
            signal.confidence * 100.0
        );
        println!("{}", serde_json::to_string_pretty(&signal)?);
    } else if let Some(dir) = arg_value(&args, "--data-dir") {
        let indices = arg_list(&args, "--indices");
        if indices.is_empty() {
            usage();
        }
        let requests: Vec<(String, TradingMode)> = indices.into_iter().map(|i| (i, mode)).collect();
        let candles = TtlCandleCache::with_default_ttl(JsonDirSource::new(dir));
        let chains = JsonDirSource::new(dir);

        let results = engine
            .build_for_indices(&candles, Some(&chains as &dyn OptionChainSource), &requests, &context)
            .await;
        let output: Vec<BatchEntry> = results
            .into_iter()
            .map(|(index, mode, result)| {
                let (signal, error) = match result {
                    Ok(signal) => (Some(signal), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                BatchEntry {
                    index,
                    mode,
                    signal,
                    error,
                }
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        usage();
    }

    Ok(())
}
