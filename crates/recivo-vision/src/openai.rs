//! OpenAI-backed receipt analyzer.
//!
//! Sends the optimized receipt image as a base64 data URL together with an
//! extraction instruction, asks for a JSON object reply, and parses it
//! into an [`ExtractionResult`].

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use recivo_core::{ExtractionError, ExtractionResult};
use tracing::{debug, info};

use crate::ReceiptAnalysis;

const EXTRACTION_PROMPT: &str = "\
You are a receipt OCR service. Read the receipt in the image and respond \
with a single JSON object containing exactly these keys:
- \"extractedMerchant\": the store or merchant name, or null
- \"extractedAmount\": the total amount as a number, or null
- \"extractedDate\": the purchase date as YYYY-MM-DD, or null
- \"extractedCategory\": one of \"meal\", \"transport\", \"lodging\", \
\"office\", \"entertainment\", \"other\", or null
- \"confidence\": your confidence in the extraction as a number in [0, 1]
If the image is not a readable receipt, respond instead with \
{\"error\": \"<short reason>\"}.";

const MAX_TOKENS: u32 = 512;

/// Converts any error into an ExtractionError::Vision.
fn vision_err(e: impl ToString) -> ExtractionError {
    ExtractionError::Vision(e.to_string())
}

/// Parses the model's reply into an extraction result.
fn parse_reply(content: &str) -> Result<ExtractionResult, ExtractionError> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
        ExtractionError::Parse(format!("{} - content: {}", e, content))
    })?;
    ExtractionResult::from_value(value)
}

/// Receipt analyzer backed by an OpenAI vision model.
///
/// Constructed once at startup and shared across requests; the underlying
/// HTTP client pools connections to the API.
pub struct OpenAiAnalyzer {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalyzer {
    /// Creates a new analyzer for the given vision model.
    ///
    /// The API key is read from `OPENAI_API_KEY` by the SDK.
    pub fn new(model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ReceiptAnalysis for OpenAiAnalyzer {
    async fn analyze(&self, image: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let start = Instant::now();
        let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(EXTRACTION_PROMPT)
            .build()
            .map_err(vision_err)?;

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .detail(ImageDetail::High)
                    .build()
                    .map_err(vision_err)?,
            )
            .build()
            .map_err(vision_err)?;

        let message = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(vec![
                    ChatCompletionRequestUserMessageContentPart::Text(text_part),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
                ]))
                .build()
                .map_err(vision_err)?,
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .response_format(ResponseFormat::JsonObject)
            .max_tokens(MAX_TOKENS)
            .messages(vec![message])
            .build()
            .map_err(vision_err)?;

        let response = self.client.chat().create(request).await.map_err(vision_err)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        info!(
            "Vision: {}ms, tokens: {}/{} (in/out)",
            elapsed_ms, input_tokens, output_tokens
        );

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::Vision("No response content".into()))?;

        debug!("Vision reply: {}", content);
        parse_reply(&content)
    }
}
