//! Builds a [`Cascade`] from [`LlmConfig`]: one [`ChainedProvider`] rung
//! per configured remote model, richest tier first by declaration order,
//! plus a local fallback rung appended last (spec §4.2).

use crate::ai::provider::{ProviderConfig, create_provider};
use crate::ai::{Cascade, ChainedProvider};
use crate::config::LlmConfig;
use crate::types::Result;

pub fn build_cascade(llm_config: &LlmConfig) -> Result<Cascade> {
    let mut rungs = Vec::with_capacity(llm_config.models.len() + 1);

    for (index, model) in llm_config.models.iter().enumerate() {
        let provider_config = ProviderConfig {
            provider: model.provider.clone(),
            model: Some(model.name.clone()),
            timeout_secs: llm_config.timeout_secs,
            temperature: llm_config.temperature,
            api_key: None,
            api_base: model.api_base.clone(),
            ..ProviderConfig::default()
        };
        let provider = create_provider(&provider_config)?;
        rungs.push(
            ChainedProvider::from_shared(provider)
                .with_priority(index.min(u8::MAX as usize) as u8)
                .with_tier(model.effective_tier().to_string()),
        );
    }

    let local_config = ProviderConfig {
        provider: "local".to_string(),
        model: Some(llm_config.local_model.clone()),
        timeout_secs: llm_config.timeout_secs,
        temperature: llm_config.temperature,
        api_key: None,
        api_base: Some(llm_config.local_api_base.clone()),
        ..ProviderConfig::default()
    };
    let local_provider = create_provider(&local_config)?;
    rungs.push(
        ChainedProvider::from_shared(local_provider)
            .with_priority(llm_config.models.len().min(u8::MAX as usize) as u8)
            .with_tier("local"),
    );

    Ok(Cascade::new(rungs, llm_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_cascade_with_local_fallback_even_with_no_remote_models() {
        let config = LlmConfig::default();
        let cascade = build_cascade(&config);
        assert!(cascade.is_ok());
    }
}
