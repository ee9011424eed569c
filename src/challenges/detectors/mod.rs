//! Challenge detection module.
//!
//! Classifies each token-exchange response as cleared, blocked by a
//! Cloudflare-style HTML interstitial, or blocked by a PerimeterX-style JSON
//! payload. Classification is pure and total: bodies that fail to parse simply
//! fail the heuristics and come out as terminal.

use http::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::challenges::core::types::content_type;
use crate::challenges::core::{RawResponse, origin_url, resolve_block_script};

/// Gate vendors the classifier knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    /// HTML interstitial (Cloudflare "Just a moment...", 1015 pages, etc.).
    HtmlInterstitial,
    /// PerimeterX JSON block payload.
    PerimeterXBlock,
}

/// Outcome of classifying a single response.
#[derive(Debug, Clone)]
pub enum ClassificationOutcome {
    /// 2xx response that matched no block heuristic.
    Success(RawResponse),
    /// HTML challenge page.
    BlockedHtml,
    /// PerimeterX block, with the page worth opening in the session if any.
    BlockedJson { navigation_url: Option<Url> },
    /// Non-2xx response that matched no block heuristic. Terminal all the same.
    Other(RawResponse),
}

impl ClassificationOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::BlockedHtml | Self::BlockedJson { .. })
    }

    pub fn challenge_type(&self) -> Option<ChallengeType> {
        match self {
            Self::BlockedHtml => Some(ChallengeType::HtmlInterstitial),
            Self::BlockedJson { .. } => Some(ChallengeType::PerimeterXBlock),
            Self::Success(_) | Self::Other(_) => None,
        }
    }

    pub fn navigation_url(&self) -> Option<&Url> {
        match self {
            Self::BlockedJson { navigation_url } => navigation_url.as_ref(),
            _ => None,
        }
    }

    /// Short tag used in logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::BlockedHtml => "blocked_html",
            Self::BlockedJson { .. } => "blocked_json",
            Self::Other(_) => "other",
        }
    }

    /// The response carried by a terminal outcome.
    pub fn into_response(self) -> Option<RawResponse> {
        match self {
            Self::Success(response) | Self::Other(response) => Some(response),
            Self::BlockedHtml | Self::BlockedJson { .. } => None,
        }
    }
}

/// Classifies token-exchange responses for one target origin.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    origin: Url,
}

impl ResponseClassifier {
    /// `base_url` may carry a path; only its origin is kept for resolving
    /// navigation hints.
    pub fn new(base_url: &Url) -> Self {
        Self {
            origin: origin_url(base_url),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify a response. The first matching heuristic wins.
    pub fn classify(&self, response: RawResponse) -> ClassificationOutcome {
        if is_html_challenge(response.status, &response.headers, &response.body) {
            return ClassificationOutcome::BlockedHtml;
        }

        if let Some(block) = perimeterx_block(response.status, &response.headers, &response.body) {
            let navigation_url = resolve_block_script(
                &self.origin,
                block.block_script.as_deref(),
                block.alt_block_script.as_deref(),
            );
            return ClassificationOutcome::BlockedJson { navigation_url };
        }

        if (200..300).contains(&response.status) {
            ClassificationOutcome::Success(response)
        } else {
            ClassificationOutcome::Other(response)
        }
    }
}

/// HTML interstitial: a gate status plus an HTML content type or HTML-looking body.
pub fn is_html_challenge(status: u16, headers: &HeaderMap, body: &str) -> bool {
    if !matches!(status, 403 | 429 | 503) {
        return false;
    }

    if content_type(headers).contains("text/html") {
        return true;
    }

    let body = body.trim_start();
    body.starts_with("<!DOCTYPE html") || body.starts_with("<html")
}

/// Script references lifted from a PerimeterX block payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerimeterXBlock {
    pub block_script: Option<String>,
    pub alt_block_script: Option<String>,
}

/// PerimeterX JSON block: 403, JSON content type, and an object carrying an
/// app id plus a block script.
pub fn perimeterx_block(status: u16, headers: &HeaderMap, body: &str) -> Option<PerimeterXBlock> {
    if status != 403 || !content_type(headers).contains("application/json") {
        return None;
    }

    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
        return None;
    };

    let truthy = |key: &str| object.get(key).is_some_and(is_truthy);
    if !(truthy("appId") || truthy("app_id")) {
        return None;
    }
    if !(truthy("blockScript") || truthy("altBlockScript")) {
        return None;
    }

    let string_field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    Some(PerimeterXBlock {
        block_script: string_field("blockScript"),
        alt_block_script: string_field("altBlockScript"),
    })
}

/// JavaScript truthiness, which is what block payload fields are checked against.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
