//! Chat-completions adapter for the document services.
//!
//! Uploaded PDFs are reduced to text locally; classification, credit extraction and
//! recommendations are single zero-temperature completions. The client is blocking, so every
//! call has to run off the async workers.

use mortgage_ai::config::ModelConfig;
use mortgage_ai::origination::{
    CreditExtraction, CreditExtractor, GatewayError, IncomeClassifier, IncomeExtraction,
    RecommendationGenerator, TextExtractor,
};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const INCOME_PROMPT: &str = "You are a document assistant. Analyze the following text and \
respond ONLY in raw JSON format.\n\
1. Classify it as one of: Pay Stub, W-2, Bank Statement.\n\
2. Extract the hourly rate, hours worked, and pay period if available.\n\
3. Calculate the yearly income based on the extracted data.\n\n\
DO NOT use markdown, code fences, or explanations.\n\n\
Your response must follow this exact JSON structure:\n\
{\n\
  \"document_type\": \"<label>\" or \"Unknown\",\n\
  \"hourly_rate\": \"<amount>\" or \"Unknown\",\n\
  \"hours_worked\": \"<amount>\" or \"Unknown\",\n\
  \"pay_period\": \"<period>\" or \"Unknown\",\n\
  \"yearly_income\": \"<amount>\" or \"Unknown\"\n\
}\n\n\
Document:\n";

const CREDIT_PROMPT: &str = "You are a document assistant. Analyze the following text and \
respond ONLY in raw JSON format.\n\
1. Extract the credit score (such as VantageScore).\n\
2. Extract the FICO score if possible.\n\
3. Extract the monthly expenses needed to calculate DTI.\n\n\
DO NOT use markdown, code fences, or explanations.\n\n\
Your response must follow this exact JSON structure:\n\
{\n\
  \"credit_score\": \"<amount>\" or \"Unknown\",\n\
  \"fico_score\": \"<amount>\" or \"Unknown\",\n\
  \"monthly_expenses\": \"<amount>\" or \"Unknown\"\n\
}\n\n\
Document:\n";

/// Document services backed by an OpenAI-compatible chat-completions endpoint.
pub(crate) struct ModelDocuments {
    client: Client,
    api_key: Secret<String>,
    completions_url: String,
    model: String,
    timeout: Duration,
}

impl ModelDocuments {
    /// Must be called outside the async runtime.
    pub(crate) fn new(config: &ModelConfig, api_key: Secret<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::Unavailable(format!("model client: {err}")))?;

        Ok(Self {
            client,
            api_key,
            completions_url: format!("{}/chat/completions", config.base_url),
            model: config.model.clone(),
            timeout: config.timeout,
        })
    }

    fn complete(&self, prompt: String) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Unavailable(format!(
                        "model request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    GatewayError::Unavailable(format!("model request failed: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    GatewayError::Unavailable("model endpoint rejected the API key".to_string())
                }
                _ => GatewayError::Unavailable(format!("model endpoint returned {status}: {body}")),
            });
        }

        let completion: ChatResponse = response
            .json()
            .map_err(|err| GatewayError::MalformedResponse(format!("completion body: {err}")))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedResponse("completion carried no content".to_string())
            })?;

        debug!(model = %self.model, chars = content.len(), "model completion received");
        Ok(content)
    }
}

impl TextExtractor for ModelDocuments {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError> {
        document_text(document)
    }
}

impl IncomeClassifier for ModelDocuments {
    fn classify(&self, text: &str) -> Result<IncomeExtraction, GatewayError> {
        let answer = self.complete(format!("{INCOME_PROMPT}{text}"))?;
        IncomeExtraction::from_model_output(&answer)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl CreditExtractor for ModelDocuments {
    fn extract_credit(&self, text: &str) -> Result<CreditExtraction, GatewayError> {
        let answer = self.complete(format!("{CREDIT_PROMPT}{text}"))?;
        CreditExtraction::from_model_output(&answer)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl RecommendationGenerator for ModelDocuments {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.complete(prompt.to_string())
    }
}

/// Text of an uploaded document: PDFs are parsed, anything else must already be UTF-8.
pub(crate) fn document_text(document: &[u8]) -> Result<String, GatewayError> {
    let text = if document.starts_with(b"%PDF") {
        pdf_extract::extract_text_from_mem(document)
            .map_err(|err| GatewayError::MalformedResponse(format!("pdf text extraction: {err}")))?
    } else {
        std::str::from_utf8(document)
            .map(str::to_string)
            .map_err(|err| {
                GatewayError::MalformedResponse(format!("document is neither PDF nor text: {err}"))
            })?
    };

    if text.trim().is_empty() {
        return Err(GatewayError::MalformedResponse(
            "document has no readable text".to_string(),
        ));
    }
    Ok(text)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    async fn completions_endpoint(answer: &'static str) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    == Some("Bearer sk-test");
                if !authorized {
                    return (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "error": { "message": "invalid key" } })),
                    );
                }
                (
                    axum::http::StatusCode::OK,
                    Json(json!({
                        "choices": [{ "message": { "role": "assistant", "content": answer } }]
                    })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test endpoint");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test endpoint");
        });
        format!("http://{addr}/v1")
    }

    fn config(base_url: String) -> ModelConfig {
        ModelConfig {
            base_url,
            timeout: Duration::from_secs(5),
            ..ModelConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn classifies_income_through_the_endpoint() {
        let base_url =
            completions_endpoint(r#"{"document_type": "W-2", "yearly_income": "$60,000"}"#).await;

        let extraction = tokio::task::spawn_blocking(move || {
            let documents = ModelDocuments::new(&config(base_url), Secret::new("sk-test".into()))
                .expect("client builds");
            documents.classify("Form W-2 Wage and Tax Statement")
        })
        .await
        .expect("worker joins")
        .expect("classified");

        assert_eq!(extraction.document_type, "W-2");
        assert_eq!(
            extraction.yearly_income.amount("yearly_income"),
            Ok(Some(dec!(60000)))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reads_credit_report_through_the_endpoint() {
        let base_url = completions_endpoint(
            r#"{"credit_score": "712", "fico_score": "Unknown", "monthly_expenses": "1,850"}"#,
        )
        .await;

        let extraction = tokio::task::spawn_blocking(move || {
            let documents = ModelDocuments::new(&config(base_url), Secret::new("sk-test".into()))
                .expect("client builds");
            documents.extract_credit("Equifax consumer report")
        })
        .await
        .expect("worker joins")
        .expect("extracted");

        assert_eq!(extraction.credit_score.score("credit_score"), Ok(Some(712)));
        assert!(extraction.fico_score.is_unknown());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_key_is_a_gateway_failure() {
        let base_url = completions_endpoint("Pre-approval likely.").await;

        let result = tokio::task::spawn_blocking(move || {
            let documents = ModelDocuments::new(&config(base_url), Secret::new("sk-wrong".into()))
                .expect("client builds");
            documents.generate("- Credit score: 700")
        })
        .await
        .expect("worker joins");

        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn free_text_answer_is_malformed() {
        let base_url = completions_endpoint("I could not find any income.").await;

        let result = tokio::task::spawn_blocking(move || {
            let documents = ModelDocuments::new(&config(base_url), Secret::new("sk-test".into()))
                .expect("client builds");
            documents.classify("blank page")
        })
        .await
        .expect("worker joins");

        assert!(matches!(result, Err(GatewayError::MalformedResponse(_))));
    }

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{INCOME_PROMPT}pay stub"),
            }],
            temperature: 0.0,
        };
        let body: Value = serde_json::to_value(&request).expect("serializes");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["messages"][0]["content"]
            .as_str()
            .expect("content")
            .ends_with("Document:\npay stub"));
    }

    #[test]
    fn plain_text_documents_pass_through() {
        assert_eq!(
            document_text(b"EMPLOYEE W-2 WAGES 60,000").expect("text"),
            "EMPLOYEE W-2 WAGES 60,000"
        );
    }

    #[test]
    fn unreadable_documents_are_rejected() {
        assert!(matches!(
            document_text(&[0xff, 0xd8, 0xff, 0xe0]),
            Err(GatewayError::MalformedResponse(_))
        ));
        assert!(matches!(
            document_text(b"   \n"),
            Err(GatewayError::MalformedResponse(_))
        ));
    }
}
