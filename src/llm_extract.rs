// src/llm_extract.rs

use crate::config::{LlmBackend, LlmSection};
use crate::error::ExtractError;
use crate::notes::{Item, ParsedNote};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Instructions for reading a handwritten remito. Product names listed here
/// are the ones the catalog and business rules know how to handle.
const SYSTEM_PROMPT: &str = r#"You are an expert at reading handwritten delivery notes (remitos) in Spanish.
Your task is to extract the list of products and their quantities from the image.

VALID PRODUCT NAMES (use these exact names):
- EQUIPO LAGO
- EQUIPO RIO
- ROMI PLUS
- TANQUE HIDRONEUMATICO
- TUBO DE CO2 (2.5KG)
- TUBO DE CO2 (3KG)
- TUBO DE CO2 (5KG)
- TUBO DE CO2 (8KG)
- TUBO DE CO2 (10KG)
- MANOMETRO
- CABLE INTERLOCK 220V
- PROTECTOR DE TENSION
- BANDEJA DE GOTEO
- BOTELLAS CANTARO 500
- BOTELLAS CANTARO 750
- TAPAS CANTARO PLATEADAS
- TAPAS CANTARO NEGRAS
- CEPILLO DE LIMPIEZA
- LLAVE DE PASO
- CONECTOR
- FUENTE

SPECIAL RULES FOR PARSING:
1. "EQUIPO LAGO + CABLE" (or similar) is TWO items:
   - "EQUIPO LAGO" (quantity 1)
   - "CABLE INTERLOCK 220V" (quantity 1)
2. "ROMI PLUS + FUENTE" is ONLY "ROMI PLUS"; the FUENTE ships with it.
3. "BOTELLAS CANTARO 500 + TAPAS" is ONLY "BOTELLAS CANTARO 500" with its quantity.
   Caps are added automatically by the system.
4. Common handwriting errors to correct:
   - "HIDRONEUMATILO" -> "HIDRONEUMATICO"
   - "PROTEITOR" -> "PROTECTOR"
   - "SKG" -> "5KG" (for CO2 tubes)
   - "TENSIÓN" -> "TENSION"
5. The quantity column is on the left side labeled "CANT."

Return ONLY a JSON object:
{
  "items": [
    {"product": "EQUIPO LAGO", "quantity": 1},
    {"product": "CABLE INTERLOCK 220V", "quantity": 1}
  ],
  "client_name": "client name from the Señores field if visible",
  "remito_number": "remito number if visible",
  "fecha": "date if visible in DD/MM/YY format"
}

IMPORTANT: Use the EXACT product names from the valid list above. Correct any typos."#;

const USER_PROMPT: &str =
    "Please extract the products and quantities from this delivery note image. Return JSON only.";

/// A photographed delivery note, ready to send.
#[derive(Debug, Clone)]
pub struct NoteImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl NoteImage {
    pub fn new(bytes: Vec<u8>, path: &Path) -> Self {
        Self {
            bytes,
            mime: mime_for(path),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }
}

/// Guess the image type from the file extension; PNG when unsure.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Anything that can turn a note image into extracted items.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image: &NoteImage) -> Result<ParsedNote, ExtractError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct ExtractedNote {
    #[serde(default)]
    items: Vec<ExtractedItem>,
    client_name: Option<String>,
    remito_number: Option<String>,
    fecha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    product: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Resolved endpoint configuration ready to make API calls.
struct ResolvedEndpoint<'a> {
    base_url: &'a str,
    model: &'a str,
    api_key: String,
}

fn api_key(backend: LlmBackend) -> Result<String, ExtractError> {
    std::env::var(backend.api_key_var())
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or(ExtractError::MissingApiKey {
            provider: backend.name(),
            var: backend.api_key_var(),
        })
}

fn build_request<'a>(llm: &LlmSection, model: &'a str, image: &NoteImage) -> ChatRequest<'a> {
    let response_format = (llm.backend == LlmBackend::OpenAi).then_some(ResponseFormat {
        kind: "json_object",
    });
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: USER_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ]),
            },
        ],
        max_tokens: llm.max_tokens,
        response_format,
    }
}

/// Round-robin over OpenRouter models, skipping ones that failed. Once every
/// model has failed the failures are forgotten and rotation starts over.
#[derive(Debug, Default)]
pub struct ModelRotation {
    models: Vec<String>,
    failed: Mutex<HashSet<String>>,
    cursor: AtomicUsize,
}

impl ModelRotation {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn next_model(&self) -> Option<String> {
        if self.models.is_empty() {
            return None;
        }
        let mut failed = self
            .failed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.models.iter().all(|m| failed.contains(m)) {
            failed.clear();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let n = self.models.len();
        (0..n)
            .map(|k| &self.models[(start + k) % n])
            .find(|m| !failed.contains(*m))
            .cloned()
    }

    pub fn mark_failed(&self, model: &str) {
        self.failed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(model.to_string());
    }
}

/// Vision-model extractor speaking the OpenAI chat-completions dialect.
pub struct LlmExtractor {
    client: Client,
    llm: LlmSection,
    rotation: ModelRotation,
}

impl LlmExtractor {
    pub fn new(llm: LlmSection) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()?;
        let rotation = ModelRotation::new(llm.openrouter.models.clone());
        info!(backend = llm.backend.name(), "LLM extractor ready");
        Ok(Self {
            client,
            llm,
            rotation,
        })
    }

    async fn call(
        &self,
        endpoint: &ResolvedEndpoint<'_>,
        image: &NoteImage,
    ) -> Result<ParsedNote, ExtractError> {
        let url = format!("{}/chat/completions", endpoint.base_url);
        let mut req = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&build_request(&self.llm, endpoint.model, image));
        if self.llm.backend == LlmBackend::OpenRouter {
            req = req
                .header("HTTP-Referer", &self.llm.openrouter.referer)
                .header("X-Title", &self.llm.openrouter.title);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ExtractError::EmptyResponse)?;

        parse_note_reply(&content)
    }

    async fn extract_openrouter(&self, image: &NoteImage) -> Result<ParsedNote, ExtractError> {
        if self.rotation.is_empty() {
            return Err(ExtractError::NoModels);
        }
        let api_key = api_key(LlmBackend::OpenRouter)?;
        let mut last = None;

        for _ in 0..self.rotation.len() {
            let Some(model) = self.rotation.next_model() else {
                break;
            };
            info!(model = %model, "Trying OpenRouter model");
            let endpoint = ResolvedEndpoint {
                base_url: &self.llm.openrouter.base_url,
                model: &model,
                api_key: api_key.clone(),
            };
            match self.call(&endpoint, image).await {
                Ok(note) => return Ok(note),
                Err(e) => {
                    warn!(model = %model, error = %e, "OpenRouter model failed");
                    self.rotation.mark_failed(&model);
                    last = Some(e);
                }
            }
        }

        Err(ExtractError::AllModelsFailed {
            last: Box::new(last.unwrap_or(ExtractError::NoModels)),
        })
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, image: &NoteImage) -> Result<ParsedNote, ExtractError> {
        let section = match self.llm.backend {
            LlmBackend::OpenRouter => return self.extract_openrouter(image).await,
            LlmBackend::OpenAi => &self.llm.openai,
            LlmBackend::DeepSeek => &self.llm.deepseek,
        };
        let endpoint = ResolvedEndpoint {
            base_url: &section.base_url,
            model: &section.model,
            api_key: api_key(self.llm.backend)?,
        };
        info!(
            url = %endpoint.base_url,
            model = %endpoint.model,
            backend = self.llm.backend.name(),
            "Calling vision model"
        );
        self.call(&endpoint, image).await
    }
}

/// Turn the model's reply into a note. The reply may be fenced in markdown
/// or wrapped in prose; only the outermost JSON object is read.
pub fn parse_note_reply(content: &str) -> Result<ParsedNote, ExtractError> {
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json_str = extract_json_object(json_str)?;

    let extracted: ExtractedNote =
        serde_json::from_str(json_str).map_err(|source| ExtractError::Json {
            raw: json_str.to_string(),
            source,
        })?;

    Ok(ParsedNote {
        items: extracted
            .items
            .into_iter()
            .map(|i| Item::extracted(i.product, i.quantity))
            .collect(),
        raw_text: Some(content.to_string()),
        client_name: extracted.client_name,
        remito_number: extracted.remito_number,
        fecha: extracted.fecha,
    })
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text.
fn extract_json_object(s: &str) -> Result<&str, ExtractError> {
    let start = s.find('{').ok_or(ExtractError::NoJson)?;
    let end = s.rfind('}').ok_or(ExtractError::NoJson)?;
    if end <= start {
        return Err(ExtractError::NoJson);
    }
    Ok(&s[start..=end])
}
