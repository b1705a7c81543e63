use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_INPUT_TOKENS: u32 = 8000;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Hard timeout on every provider call. Generous because self-hosted
/// models can take many minutes to answer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1200);

/// Rough character-per-token ratio used for the input budget check.
const CHARS_PER_TOKEN: usize = 4;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const ENDPOINT_OPENAI: &str = "https://api.openai.com/v1/chat/completions";
const ENDPOINT_ANTHROPIC: &str = "https://api.anthropic.com/v1/messages";
const ENDPOINT_GOOGLE: &str = "https://generativelanguage.googleapis.com";
const ENDPOINT_GROQ: &str = "https://api.groq.com/openai/v1/chat/completions";
const ENDPOINT_MISTRAL: &str = "https://api.mistral.ai/v1/chat/completions";
const ENDPOINT_PERPLEXITY: &str = "https://api.perplexity.ai/chat/completions";
const ENDPOINT_OPENROUTER: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("invalid response envelope: missing `{0}`")]
    MissingField(&'static str),
}

/// One configured provider instance: identity, tunables and the
/// provider-specific settings variant.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderInstance {
    pub id: String,
    pub title: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_max_input_tokens() -> u32 {
    DEFAULT_MAX_INPUT_TOKENS
}
fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

/// Closed set of supported backends. Each variant carries exactly the
/// credential and endpoint fields that backend needs, so an instance
/// with an unknown kind or missing fields is rejected when the config
/// deserializes, not at dispatch time.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSettings {
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
    },
    Anthropic {
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        /// Full messages-API URL; the hosted endpoint when unset.
        #[serde(default)]
        endpoint: Option<String>,
    },
    Google {
        api_key: String,
        #[serde(default = "default_google_model")]
        model: String,
        /// API base URL; the hosted endpoint when unset.
        #[serde(default)]
        endpoint: Option<String>,
    },
    Groq {
        api_key: String,
        #[serde(default = "default_groq_model")]
        model: String,
    },
    MistralAi {
        api_key: String,
        #[serde(default = "default_mistral_model")]
        model: String,
    },
    PerplexityAi {
        api_key: String,
        #[serde(default = "default_perplexity_model")]
        model: String,
    },
    OpenRouter {
        api_key: String,
        #[serde(default = "default_openrouter_model")]
        model: String,
    },
    LocalAi {
        host: String,
        #[serde(default = "default_localai_port")]
        port: u16,
        #[serde(default)]
        https: bool,
        #[serde(default = "default_localai_model")]
        model: String,
    },
    Ollama {
        host: String,
        #[serde(default = "default_ollama_port")]
        port: u16,
        #[serde(default)]
        https: bool,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    OpenAiAzure {
        api_key: String,
        /// Resource hostname, e.g. `myresource.openai.azure.com`.
        endpoint: String,
        deployment_id: String,
        #[serde(default = "default_azure_api_version")]
        api_version: String,
    },
    CustomOpenAi {
        /// Base URL; `/v1/chat/completions` is appended.
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_localai_model")]
        model: String,
    },
    GenericOpenAi {
        /// Full chat-completions URL, used as-is.
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_localai_model")]
        model: String,
    },
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}
fn default_google_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_groq_model() -> String {
    "llama3-70b-8192".to_string()
}
fn default_mistral_model() -> String {
    "mistral-large-latest".to_string()
}
fn default_perplexity_model() -> String {
    "llama-3-sonar-large-32k-online".to_string()
}
fn default_openrouter_model() -> String {
    "meta-llama/llama-3-70b-instruct".to_string()
}
fn default_localai_model() -> String {
    "gpt-4".to_string()
}
fn default_ollama_model() -> String {
    "llama3".to_string()
}
fn default_localai_port() -> u16 {
    8080
}
fn default_ollama_port() -> u16 {
    11434
}
fn default_azure_api_version() -> String {
    "2025-01-01-preview".to_string()
}

impl ProviderSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderSettings::OpenAi { .. } => "openai",
            ProviderSettings::Anthropic { .. } => "anthropic",
            ProviderSettings::Google { .. } => "google",
            ProviderSettings::Groq { .. } => "groq",
            ProviderSettings::MistralAi { .. } => "mistral_ai",
            ProviderSettings::PerplexityAi { .. } => "perplexity_ai",
            ProviderSettings::OpenRouter { .. } => "open_router",
            ProviderSettings::LocalAi { .. } => "local_ai",
            ProviderSettings::Ollama { .. } => "ollama",
            ProviderSettings::OpenAiAzure { .. } => "open_ai_azure",
            ProviderSettings::CustomOpenAi { .. } => "custom_open_ai",
            ProviderSettings::GenericOpenAi { .. } => "generic_open_ai",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderSettings::OpenAi { model, .. }
            | ProviderSettings::Anthropic { model, .. }
            | ProviderSettings::Google { model, .. }
            | ProviderSettings::Groq { model, .. }
            | ProviderSettings::MistralAi { model, .. }
            | ProviderSettings::PerplexityAi { model, .. }
            | ProviderSettings::OpenRouter { model, .. }
            | ProviderSettings::LocalAi { model, .. }
            | ProviderSettings::Ollama { model, .. }
            | ProviderSettings::CustomOpenAi { model, .. }
            | ProviderSettings::GenericOpenAi { model, .. } => model,
            ProviderSettings::OpenAiAzure { deployment_id, .. } => deployment_id,
        }
    }

    /// Reject instances whose required credentials or endpoints are
    /// blank. Checked once at startup; a failing instance must not
    /// initialize.
    pub fn validate(&self) -> Result<(), String> {
        let blank = |s: &str, what: &str| {
            if s.trim().is_empty() {
                Err(format!("missing {what}"))
            } else {
                Ok(())
            }
        };
        match self {
            ProviderSettings::OpenAi { api_key, .. }
            | ProviderSettings::Anthropic { api_key, .. }
            | ProviderSettings::Google { api_key, .. }
            | ProviderSettings::Groq { api_key, .. }
            | ProviderSettings::MistralAi { api_key, .. }
            | ProviderSettings::PerplexityAi { api_key, .. }
            | ProviderSettings::OpenRouter { api_key, .. } => blank(api_key, "api_key"),
            ProviderSettings::LocalAi { host, .. } | ProviderSettings::Ollama { host, .. } => {
                blank(host, "host")
            }
            ProviderSettings::OpenAiAzure {
                api_key,
                endpoint,
                deployment_id,
                ..
            } => {
                blank(api_key, "api_key")?;
                blank(endpoint, "endpoint")?;
                blank(deployment_id, "deployment_id")
            }
            ProviderSettings::CustomOpenAi { endpoint, .. }
            | ProviderSettings::GenericOpenAi { endpoint, .. } => blank(endpoint, "endpoint"),
        }
    }
}

/// Truncate an oversized prompt to the configured input budget.
/// Tail characters are dropped; an over-budget prompt is never sent.
pub fn truncate_to_budget(prompt: &str, max_input_tokens: u32) -> String {
    let budget = max_input_tokens as usize * CHARS_PER_TOKEN;
    if prompt.chars().count() <= budget {
        return prompt.to_string();
    }
    tracing::warn!(
        budget_tokens = max_input_tokens,
        "prompt over input budget, truncating"
    );
    prompt.chars().take(budget).collect()
}

/// Issues one chat-completion request per dispatch and extracts the
/// generated text from the backend-specific envelope.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("HTTP client build failed, falling back to defaults: {}", e);
                reqwest::Client::default()
            }
        };
        ProviderClient { client }
    }

    /// Translate the prompt and instance tunables into one outbound
    /// request. Never retries; never panics on malformed envelopes.
    pub async fn dispatch(
        &self,
        prompt: &str,
        instance: &ProviderInstance,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let prompt = truncate_to_budget(prompt, instance.max_input_tokens);
        let max_out = instance.max_output_tokens;

        match &instance.settings {
            ProviderSettings::OpenAi { api_key, model } => {
                self.openai_chat(ENDPOINT_OPENAI, Some(api_key), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::Groq { api_key, model } => {
                self.openai_chat(ENDPOINT_GROQ, Some(api_key), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::MistralAi { api_key, model } => {
                self.openai_chat(ENDPOINT_MISTRAL, Some(api_key), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::PerplexityAi { api_key, model } => {
                self.openai_chat(ENDPOINT_PERPLEXITY, Some(api_key), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::OpenRouter { api_key, model } => {
                self.openai_chat(ENDPOINT_OPENROUTER, Some(api_key), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::LocalAi {
                host,
                port,
                https,
                model,
            } => {
                let url = format!(
                    "{}://{}:{}/v1/chat/completions",
                    scheme(*https),
                    host,
                    port
                );
                self.openai_chat(&url, None, model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::CustomOpenAi {
                endpoint,
                api_key,
                model,
            } => {
                let url = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
                self.openai_chat(&url, api_key.as_deref(), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::GenericOpenAi {
                endpoint,
                api_key,
                model,
            } => {
                self.openai_chat(endpoint, api_key.as_deref(), model, &prompt, temperature, max_out)
                    .await
            }
            ProviderSettings::Anthropic {
                api_key,
                model,
                endpoint,
            } => {
                let url = endpoint.as_deref().unwrap_or(ENDPOINT_ANTHROPIC);
                let body = json!({
                    "model": model,
                    "messages": [{"role": "user", "content": prompt}],
                    "max_tokens": max_out,
                    "temperature": temperature,
                });
                let envelope = self
                    .send(
                        self.client
                            .post(url)
                            .header("x-api-key", api_key)
                            .header("anthropic-version", ANTHROPIC_VERSION)
                            .json(&body),
                    )
                    .await?;
                extract_anthropic(&envelope)
            }
            ProviderSettings::Google {
                api_key,
                model,
                endpoint,
            } => {
                let base = endpoint
                    .as_deref()
                    .unwrap_or(ENDPOINT_GOOGLE)
                    .trim_end_matches('/');
                let url = format!(
                    "{base}/v1beta/models/{model}:generateContent?key={api_key}"
                );
                let body = json!({
                    "contents": [{"parts": [{"text": prompt}]}],
                    "generationConfig": {
                        "temperature": temperature,
                        "maxOutputTokens": max_out,
                    },
                });
                let envelope = self.send(self.client.post(&url).json(&body)).await?;
                extract_google(&envelope)
            }
            ProviderSettings::Ollama {
                host,
                port,
                https,
                model,
            } => {
                let url = format!("{}://{}:{}/api/chat", scheme(*https), host, port);
                let body = json!({
                    "model": model,
                    "messages": [{"role": "user", "content": prompt}],
                    "stream": false,
                    "options": {
                        "temperature": temperature,
                        "num_predict": max_out,
                    },
                });
                let envelope = self.send(self.client.post(&url).json(&body)).await?;
                extract_ollama(&envelope)
            }
            ProviderSettings::OpenAiAzure {
                api_key,
                endpoint,
                deployment_id,
                api_version,
            } => {
                let url = format!(
                    "https://{endpoint}/openai/deployments/{deployment_id}/chat/completions?api-version={api_version}"
                );
                let body = json!({
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": temperature,
                    "max_tokens": max_out,
                });
                let envelope = self
                    .send(self.client.post(&url).header("api-key", api_key).json(&body))
                    .await?;
                extract_openai(&envelope)
            }
        }
    }

    async fn openai_chat(
        &self,
        url: &str,
        bearer: Option<&str>,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }
        let envelope = self.send(request).await?;
        extract_openai(&envelope)
    }

    /// Common request tail: non-2xx becomes an API error carrying the
    /// body for diagnostics, a 2xx body is decoded into a JSON value.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let snippet: String = message.chars().take(500).collect();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: snippet,
            });
        }
        Ok(response.json().await?)
    }
}

fn scheme(https: bool) -> &'static str {
    if https {
        "https"
    } else {
        "http"
    }
}

// Envelope extraction. Backends regularly return 2xx bodies missing
// the expected keys under load, so each step names the absent field.

fn extract_openai(envelope: &Value) -> Result<String, ProviderError> {
    envelope
        .get("choices")
        .ok_or(ProviderError::MissingField("choices"))?
        .get(0)
        .ok_or(ProviderError::MissingField("choices[0]"))?
        .get("message")
        .ok_or(ProviderError::MissingField("choices[0].message"))?
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProviderError::MissingField("choices[0].message.content"))
}

fn extract_anthropic(envelope: &Value) -> Result<String, ProviderError> {
    envelope
        .get("content")
        .ok_or(ProviderError::MissingField("content"))?
        .get(0)
        .ok_or(ProviderError::MissingField("content[0]"))?
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProviderError::MissingField("content[0].text"))
}

fn extract_google(envelope: &Value) -> Result<String, ProviderError> {
    envelope
        .get("candidates")
        .ok_or(ProviderError::MissingField("candidates"))?
        .get(0)
        .ok_or(ProviderError::MissingField("candidates[0]"))?
        .get("content")
        .ok_or(ProviderError::MissingField("candidates[0].content"))?
        .get("parts")
        .ok_or(ProviderError::MissingField("candidates[0].content.parts"))?
        .get(0)
        .ok_or(ProviderError::MissingField("candidates[0].content.parts[0]"))?
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProviderError::MissingField(
            "candidates[0].content.parts[0].text",
        ))
}

fn extract_ollama(envelope: &Value) -> Result<String, ProviderError> {
    envelope
        .get("message")
        .ok_or(ProviderError::MissingField("message"))?
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProviderError::MissingField("message.content"))
}
