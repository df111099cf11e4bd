//! Relay server entry point.
//!
//! Builds providers, the session store and the pipeline from configuration,
//! then serves HTTP until Ctrl+C or SIGTERM.

use crate::config::{Config, SttBackend};
use crate::error::{Result, RelayError};
use crate::notify::{ChannelRegistry, EventNotifier};
use crate::pipeline::{PipelineConfig, TranslationPipeline};
use crate::provider::HttpSettings;
use crate::server::auth::{SupabaseVerifier, TokenVerifier};
use crate::server::{AppState, create_router};
use crate::session::SessionStore;
use crate::stt::{AssemblyAiStt, ElevenLabsStt, SpeechToText};
use crate::translate::{GeminiTranslator, Translator};
use crate::tts::{ElevenLabsTts, TextToSpeech};
use std::sync::Arc;
use std::time::Duration;

/// Command-line overrides for `serve`.
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub no_auth: bool,
}

/// Apply CLI overrides on top of file and environment configuration.
pub fn apply_overrides(mut config: Config, overrides: &ServeOverrides) -> Config {
    if let Some(bind) = &overrides.bind {
        config.server.bind = bind.clone();
    }
    if let Some(secs) = overrides.request_timeout_secs {
        config.providers.request_timeout_secs = secs;
    }
    if overrides.no_auth {
        config.auth.enabled = false;
    }
    config
}

/// Wire providers, store, notifier and pipeline into the router state.
///
/// Provider secrets are not read here; each provider reads its own on
/// first use.
pub fn build_state(config: &Config) -> Result<AppState> {
    let http = HttpSettings {
        request_timeout: Duration::from_secs(config.providers.request_timeout_secs),
    };

    let stt: Arc<dyn SpeechToText> = match config.providers.stt {
        SttBackend::ElevenLabs => Arc::new(ElevenLabsStt::new(&http)?),
        SttBackend::AssemblyAi => Arc::new(AssemblyAiStt::new(&http)?),
    };
    let translator: Arc<dyn Translator> = Arc::new(GeminiTranslator::new(&http)?);
    let mut tts = ElevenLabsTts::new(&http)?;
    if let Some(voice) = &config.providers.tts_voice {
        tts = tts.with_voice(voice);
    }
    let tts: Arc<dyn TextToSpeech> = Arc::new(tts);

    preflight(stt.as_ref(), translator.as_ref(), tts.as_ref());

    let store = Arc::new(SessionStore::new());
    let channels = Arc::new(ChannelRegistry::new());
    let pipeline = TranslationPipeline::new(
        store.clone(),
        stt,
        translator,
        tts,
        EventNotifier::new(channels.clone()),
        PipelineConfig {
            voice: None,
            staging_dir: config.providers.staging_dir.clone(),
        },
    );

    let verifier: Option<Arc<dyn TokenVerifier>> = if config.auth.enabled {
        Some(Arc::new(SupabaseVerifier::new(&http)?))
    } else {
        tracing::warn!("authentication disabled; /ws accepts any client");
        None
    };

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        store,
        channels,
        verifier,
        default_sample_rate: config.server.default_sample_rate,
        static_dir: config.server.static_dir.clone(),
    })
}

/// Warn early about providers whose secrets are missing. Runs still fail
/// with a configuration error when they reach that provider.
fn preflight(stt: &dyn SpeechToText, translator: &dyn Translator, tts: &dyn TextToSpeech) {
    let checks = [
        (stt.name(), stt.initialize()),
        (translator.name(), translator.initialize()),
        (tts.name(), tts.initialize()),
    ];
    for (name, result) in checks {
        match result {
            Ok(()) => tracing::debug!(provider = name, "provider ready"),
            Err(e) => tracing::warn!(provider = name, error = %e, "provider not configured"),
        }
    }
}

/// Serve until a shutdown signal arrives, then drop every connection and
/// clear the session store.
pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    let state = build_state(&config)?;
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| RelayError::Configuration {
            message: format!("Failed to bind {}: {}", config.server.bind, e),
        })?;
    tracing::info!(
        "voxrelay {} listening on {}",
        crate::version_string(),
        config.server.bind
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for (session_id, outcome) in state.channels.teardown_all() {
        if let Err(e) = outcome {
            tracing::debug!(session = %session_id, error = %e, "close on shutdown failed");
        }
    }
    state.store.clear();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let overrides = ServeOverrides {
            bind: Some("127.0.0.1:9999".to_string()),
            request_timeout_secs: Some(5),
            no_auth: true,
        };
        let config = apply_overrides(Config::default(), &overrides);

        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.providers.request_timeout_secs, 5);
        assert!(!config.auth.enabled);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let config = apply_overrides(Config::default(), &ServeOverrides::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn state_builds_without_provider_secrets() {
        let mut config = Config::default();
        config.providers.stt = SttBackend::AssemblyAi;
        config.auth.enabled = false;

        let state = build_state(&config).unwrap();
        assert!(state.verifier.is_none());
        assert_eq!(state.default_sample_rate, 48000);
        assert!(state.store.is_empty());
    }

    #[test]
    fn auth_enabled_installs_verifier() {
        let state = build_state(&Config::default()).unwrap();
        assert!(state.verifier.is_some());
    }

    #[tokio::test]
    async fn serve_rejects_invalid_config() {
        let mut config = Config::default();
        config.server.bind = "nowhere".to_string();
        assert!(matches!(
            serve(config).await,
            Err(RelayError::ConfigInvalidValue { .. })
        ));
    }
}
