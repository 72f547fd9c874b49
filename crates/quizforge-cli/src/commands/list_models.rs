//! The `quizforge list-models` command.

use std::path::PathBuf;

use anyhow::Result;
use futures::future::join_all;

use quizforge_core::traits::ModelInfo;
use quizforge_providers::config::{create_generator, load_config_from, ProviderConfig};
use quizforge_providers::ollama::OllamaProvider;

async fn models_for(config: &ProviderConfig) -> Result<Vec<ModelInfo>> {
    match config {
        // Ollama only knows what has been pulled locally.
        ProviderConfig::Ollama { base_url } => {
            OllamaProvider::new(base_url)?.list_models_async().await
        }
        other => Ok(create_generator(other)?.available_models()),
    }
}

pub async fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut selected: Vec<(&String, &ProviderConfig)> = config
        .providers
        .iter()
        .filter(|(name, _)| provider_filter.as_ref().map_or(true, |f| f == *name))
        .collect();
    selected.sort_by(|a, b| a.0.cmp(b.0));

    let listings = join_all(selected.iter().map(|(_, c)| models_for(c))).await;

    let mut found_any = false;
    for ((name, _), listing) in selected.iter().zip(listings) {
        match listing {
            Ok(models) if !models.is_empty() => {
                found_any = true;
                println!("Provider: {name}");
                for model in &models {
                    if model.max_context > 0 {
                        println!("  {} ({}, {}K context)", model.id, model.name, model.max_context / 1000);
                    } else {
                        println!("  {}", model.id);
                    }
                }
                println!();
            }
            Ok(_) => println!("Provider: {name} (no models found)\n"),
            Err(e) => eprintln!("Provider: {name} unavailable: {e:#}\n"),
        }
    }

    if !found_any {
        println!("No models found. Run `quizforge init` to create a config file.");
    }

    Ok(())
}
