use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;

const MASK: &str = "***REDACTED***";
const SECRET_NAMES: [&str; 8] = [
    "key",
    "api_key",
    "apikey",
    "token",
    "authorization",
    "password",
    "x-api-key",
    "x-goog-api-key",
];

pub const DEFAULT_MAX_BODY_CHARS: usize = 16_000;

/// Decides how much of an HTTP exchange reaches the session trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Redactor {
    pub fn new(redact_secrets: bool) -> Self {
        Self {
            redact_secrets,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn url(&self, url: &Url) -> String {
        if !self.redact_secrets || url.query().is_none() {
            return url.to_string();
        }

        let pairs = url
            .query_pairs()
            .map(|(name, value)| {
                let value = if is_secret_name(&name) {
                    MASK.to_string()
                } else {
                    value.into_owned()
                };
                (name.into_owned(), value)
            })
            .collect::<Vec<_>>();

        let mut masked = url.clone();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
        masked.to_string()
    }

    pub fn header(&self, name: &HeaderName, value: &HeaderValue) -> String {
        let shown = if self.redact_secrets && is_secret_name(name.as_str()) {
            MASK.to_string()
        } else {
            value
                .to_str()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|_| "<non-utf8>".to_string())
        };
        format!("{}: {shown}", name.as_str())
    }

    pub fn body(&self, raw: &str) -> String {
        let body = if self.redact_secrets {
            mask_json_body(raw)
        } else {
            raw.to_string()
        };
        truncate_chars(&body, self.max_body_chars)
    }
}

fn mask_json_body(raw: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    mask_json(&mut json);
    serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
}

fn mask_json(value: &mut Value) {
    match value {
        Value::Object(map) => map.iter_mut().for_each(|(name, item)| {
            if is_secret_name(name) {
                *item = Value::String(MASK.to_string());
            } else {
                mask_json(item);
            }
        }),
        Value::Array(items) => items.iter_mut().for_each(mask_json),
        _ => {}
    }
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some((cut, _)) => {
            let dropped = input[cut..].chars().count();
            format!("{}... <truncated {dropped} chars>", &input[..cut])
        }
    }
}

fn is_secret_name(name: &str) -> bool {
    SECRET_NAMES
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}
