use crate::language::is_passthrough_language;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Text translation used for spoken warnings.
///
/// Never fails: on any error the input text is returned unchanged.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> String;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

/// Calls `POST {base_url}/translate` on the inference host
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranslator {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client<S: Into<String>>(client: reqwest::Client, base_url: S) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn request(&self, text: &str, target_language: &str) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&TranslateRequest {
                text,
                target_lang: target_language,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<TranslateResponse>()
            .await?;
        Ok(response.translated_text)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> String {
        if text.trim().is_empty() || is_passthrough_language(target_language) {
            return text.to_string();
        }

        match self.request(text, target_language).await {
            Ok(translated) if !translated.is_empty() => {
                debug!("Translated {:?} into {}", text, target_language);
                translated
            }
            Ok(_) => text.to_string(),
            Err(e) => {
                warn!("Translation into {} failed: {}", target_language, e);
                text.to_string()
            }
        }
    }
}

/// Returns the text unchanged
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _target_language: &str) -> String {
        text.to_string()
    }
}
