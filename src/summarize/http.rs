use super::{SummarizeError, Summarizer};
use crate::{config::SummarizerConfig, lifecycle::LoadError};
use anyhow::{bail, Context};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const WARM_UP_TEXT: &str = "The library opens at nine and closes at five.";

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    max_length: usize,
    min_length: usize,
    do_sample: bool,
}

#[derive(Deserialize)]
struct SummaryItem {
    summary_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<SummaryItem>),
    Single(SummaryItem),
    Error { error: String },
}

/// Summarizer backed by a Hugging Face style inference endpoint
/// (`facebook/bart-large-cnn` by default).
pub struct HttpSummarizer {
    client: reqwest::blocking::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpSummarizer {
    pub fn new(config: &SummarizerConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("invalid summarizer endpoint '{}'", config.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!("summarizer endpoint must be http(s), got '{}'", endpoint.scheme());
        }

        let token = std::env::var(&config.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if token.is_none() {
            log::debug!("{} not set, calling summarizer without a token", config.token_env);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build summarizer http client")?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    /// Build the client and check the model answers, so a ready summarizer
    /// is one that has served a request.
    pub fn connect(config: &SummarizerConfig) -> anyhow::Result<Self> {
        let summarizer = Self::new(config)?;
        summarizer
            .summarize(WARM_UP_TEXT, 16, 1)
            .with_context(|| format!("warm-up request to {} failed", summarizer.endpoint))?;
        Ok(summarizer)
    }

    fn parse_response(&self, status: StatusCode, body: &str) -> Result<String, SummarizeError> {
        let parsed = serde_json::from_str::<InferenceResponse>(body);

        if status == StatusCode::SERVICE_UNAVAILABLE {
            let reason = match parsed {
                Ok(InferenceResponse::Error { error }) => error,
                _ => body.to_string(),
            };
            return Err(SummarizeError::Unavailable(LoadError {
                model: self.endpoint.to_string(),
                reason,
            }));
        }

        match parsed {
            Ok(InferenceResponse::Error { error }) => {
                Err(SummarizeError::Request(format!("{status}: {error}")))
            }
            _ if !status.is_success() => Err(SummarizeError::Request(format!("{status}: {body}"))),
            Ok(InferenceResponse::Batch(items)) => items
                .into_iter()
                .next()
                .map(|item| item.summary_text)
                .ok_or_else(|| SummarizeError::Response("empty result list".to_string())),
            Ok(InferenceResponse::Single(item)) => Ok(item.summary_text),
            Err(err) => Err(SummarizeError::Response(err.to_string())),
        }
    }
}

impl Summarizer for HttpSummarizer {
    fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, SummarizeError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                max_length,
                min_length,
                do_sample: false,
            },
        };

        let mut req = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .map_err(|err| SummarizeError::Request(err.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|err| SummarizeError::Request(err.to_string()))?;

        log::debug!("summarizer responded {status} ({} bytes)", body.len());

        self.parse_response(status, &body)
    }
}
