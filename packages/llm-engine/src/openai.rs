//! OpenAI-compatible HTTP engine
//!
//! Talks to any server exposing `/v1/models` and a streaming
//! `/v1/chat/completions` endpoint (LM Studio, llama.cpp server, vLLM).
//! "Loading" the model means checking that the server is reachable and
//! serves the configured model; the server owns the weights.

use crate::config::EngineConfig;
use crate::engine::{ChatMessage, DeltaStream, InferenceEngine, InitProgress, ProgressCallback};
use crate::error::{EngineError, Result};
use crate::sse::{CompletionChunk, SseDecoder, SseFrame, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Timing and token counts for the last completed generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: u64,
    pub prefill: Duration,
    pub decode: Duration,
}

impl GenerationStats {
    fn rate(tokens: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            tokens as f64 / secs
        }
    }

    /// Same shape as the browser runtime's stats line
    pub fn display(&self) -> String {
        let prefill = match self.prompt_tokens {
            Some(tokens) => format!("{:.1} tokens/sec", Self::rate(tokens, self.prefill)),
            None => "n/a".to_string(),
        };
        format!(
            "prefill: {}, decoding: {:.1} tokens/sec",
            prefill,
            Self::rate(self.completion_tokens, self.decode)
        )
    }
}

/// Streaming chat engine for OpenAI-compatible servers
pub struct OpenAiEngine {
    config: EngineConfig,
    client: reqwest::Client,
    loaded: AtomicBool,
    interrupted: Arc<AtomicBool>,
    stats: Arc<Mutex<Option<GenerationStats>>>,
}

impl OpenAiEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            loaded: AtomicBool::new(false),
            interrupted: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.config.endpoint(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Model identifiers served by the remote server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self.request(reqwest::Method::GET, "models").send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ServerStatus {
                status: status.as_u16(),
                body,
            });
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl InferenceEngine for OpenAiEngine {
    async fn load(&self, progress: ProgressCallback) -> Result<()> {
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }

        let started = Instant::now();
        progress(InitProgress {
            progress: 0.0,
            text: format!("Connecting to {}", self.config.base_url),
            time_elapsed: 0.0,
        });

        let models = self.list_models().await.map_err(|e| {
            EngineError::load_failed(format!("{} unreachable: {}", self.config.base_url, e))
        })?;

        // Servers that do not enumerate models accept any identifier
        if !models.is_empty() && !models.iter().any(|m| m == &self.config.model) {
            return Err(EngineError::ModelNotFound(self.config.model.clone()));
        }

        self.loaded.store(true, Ordering::SeqCst);
        progress(InitProgress {
            progress: 1.0,
            text: format!("Model {} ready", self.config.model),
            time_elapsed: started.elapsed().as_secs_f64(),
        });
        tracing::info!("Inference engine ready: {} @ {}", self.config.model, self.config.base_url);

        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn is_model_cached(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == &self.config.model))
    }

    async fn reset_chat(&self) -> Result<()> {
        // Requests are stateless; nothing is kept between completions
        Ok(())
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream> {
        if !self.is_loaded() {
            return Err(EngineError::NotLoaded);
        }
        self.interrupted.store(false, Ordering::SeqCst);

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        let started = Instant::now();
        let response = self
            .request(reqwest::Method::POST, "chat/completions")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ServerStatus {
                status: status.as_u16(),
                body,
            });
        }

        let interrupted = self.interrupted.clone();
        let stats = self.stats.clone();
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut first_token: Option<Instant> = None;
            let mut usage: Option<Usage> = None;
            let mut deltas: u64 = 0;

            loop {
                let (frames, finished) = match bytes.next().await {
                    Some(chunk) => {
                        if interrupted.load(Ordering::SeqCst) {
                            tracing::debug!("Generation interrupted after {} deltas", deltas);
                            break;
                        }
                        match chunk {
                            Ok(chunk) => (decoder.push(&chunk), false),
                            Err(e) => {
                                yield Err(EngineError::from(e));
                                return;
                            }
                        }
                    }
                    None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
                };

                let mut done = finished;
                for frame in frames {
                    match frame {
                        SseFrame::Done => {
                            done = true;
                            break;
                        }
                        SseFrame::Data(payload) => {
                            let parsed: CompletionChunk = match serde_json::from_str(&payload) {
                                Ok(parsed) => parsed,
                                Err(e) => {
                                    yield Err(EngineError::protocol(format!("{}: {}", e, payload)));
                                    return;
                                }
                            };
                            if parsed.usage.is_some() {
                                usage = parsed.usage;
                            }
                            if let Some(text) = parsed.delta_text() {
                                first_token.get_or_insert_with(Instant::now);
                                deltas += 1;
                                yield Ok::<String, EngineError>(text.to_string());
                            }
                        }
                    }
                }
                if done {
                    break;
                }
            }

            let first = first_token.unwrap_or_else(Instant::now);
            let generation = GenerationStats {
                prompt_tokens: usage.map(|u| u.prompt_tokens),
                completion_tokens: usage.map(|u| u.completion_tokens).unwrap_or(deltas),
                prefill: first.saturating_duration_since(started),
                decode: first.elapsed(),
            };
            if let Ok(mut slot) = stats.lock() {
                *slot = Some(generation);
            }
        };

        Ok(Box::pin(stream))
    }

    async fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    async fn runtime_stats(&self) -> Result<String> {
        let stats = self
            .stats
            .lock()
            .map_err(|_| EngineError::inference("stats lock poisoned"))?;
        Ok(match *stats {
            Some(stats) => stats.display(),
            None => "No generation statistics available".to_string(),
        })
    }
}
