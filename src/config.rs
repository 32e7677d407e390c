use anyhow::{Context, Result, bail};
use log::debug;
use reqwest::{
    Client, Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::body::{LenientTypedDecoder, MapDecoder, TypedDecoder};
use crate::classify::HttpErrorClassifier;
use crate::http::{HttpClient, RetryConfig};

/// Environment variable holding a bearer token.
pub const TOKEN_ENV: &str = "KORK_HTTP_TOKEN";

/// Environment variable holding the base URL for relative targets.
pub const BASE_URL_ENV: &str = "KORK_HTTP_BASE_URL";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which [`crate::body::BodyDecoder`] the classifier reads error bodies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DecoderKind {
    /// Free-form JSON object
    #[default]
    Map,
    /// Typed struct, rejects unknown `kind` values
    Typed,
    /// Typed struct, unknown `kind` values read as null
    Lenient,
}

impl DecoderKind {
    pub fn classifier(self) -> HttpErrorClassifier {
        match self {
            DecoderKind::Map => HttpErrorClassifier::with_decoder(MapDecoder),
            DecoderKind::Typed => HttpErrorClassifier::with_decoder(TypedDecoder),
            DecoderKind::Lenient => HttpErrorClassifier::with_decoder(LenientTypedDecoder),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Option<Url>,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub decoder: DecoderKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            user_agent: format!("kork-http/{}", env!("KORK_HTTP_VERSION")),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            decoder: DecoderKind::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the token taken from [`TOKEN_ENV`] when set.
    pub fn from_env() -> Self {
        Self {
            token: env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).with_context(|| format!("Invalid base URL '{}'", base_url))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Absolute targets are used as-is, relative ones are joined onto the base URL.
    pub fn resolve_url(&self, target: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(target) {
            return Ok(url);
        }
        match &self.base_url {
            Some(base) => base
                .join(target)
                .with_context(|| format!("Cannot join '{}' onto {}", target, base)),
            None => bail!(
                "'{}' is not an absolute URL and no base URL is configured (set --base-url or {})",
                target,
                BASE_URL_ENV
            ),
        }
    }

    pub fn build(&self) -> Result<HttpClient> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Token contains characters not allowed in a header")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using bearer token for authentication: {}", mask_token(token));
        }

        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let classifier = self.decoder.classifier();
        debug!("Classifying error bodies with the {} decoder", classifier.decoder().name());

        Ok(HttpClient::new(
            client,
            Arc::new(classifier),
            self.retry.clone(),
        ))
    }
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
