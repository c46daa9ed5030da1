use anyhow::{Context, Result, bail};
use batchscribe::cli::Cli;
use batchscribe::inference::InferenceEngine;
use batchscribe::{
    Config, EnergyScorer, StaticVocabulary, TranscriptionRequest, TranscriptionService,
};
use clap::Parser;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    }
    .with_env_overrides();

    if let Some(model) = cli.model.clone() {
        config.engine.model = Some(model);
    }
    let batch_size = cli.batch_size.unwrap_or(config.batcher.batch_size);

    let engine = build_engine(&config)?;
    let service = TranscriptionService::new(
        config,
        Arc::new(EnergyScorer::default()),
        Arc::new(StaticVocabulary),
        engine,
    )?;

    let samples = batchscribe::audio::read_wav(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let request = TranscriptionRequest::new(samples, &cli.language).with_task(cli.task.into());

    let mut outcomes = service.transcribe_batch(vec![request], batch_size)?;
    let results = outcomes.remove(0).result?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", json);

    Ok(())
}

#[cfg(feature = "whisper")]
fn build_engine(config: &Config) -> Result<Arc<dyn InferenceEngine>> {
    use batchscribe::inference::{WhisperEngine, WhisperEngineConfig};

    let Some(model_path) = config.engine.model.clone() else {
        bail!("no model configured; pass --model or set BATCHSCRIBE_MODEL");
    };
    let engine = WhisperEngine::new(WhisperEngineConfig {
        model_path,
        threads: config.engine.threads,
    })?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "whisper"))]
fn build_engine(_config: &Config) -> Result<Arc<dyn InferenceEngine>> {
    bail!("built without an inference engine; rebuild with --features whisper");
}
