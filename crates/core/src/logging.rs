//! Logging and tracing initialization.
//!
//! [`init_tracing`] configures structured logging in one of two modes:
//! - **JSON mode** (`json = true`): one JSON object per line with
//!   millisecond UTC timestamps, for CI / cron log capture.
//! - **Pretty mode** (`json = false`): human-readable output for local runs.
//!
//! Logs go to stderr; stdout is reserved for the report.
//! Both modes respect `RUST_LOG` (e.g., `RUST_LOG=cefi_execution=debug`).
//!
//! A [`SecretSanitizer`] layer emits a warning whenever an event or span
//! records a field that looks like an API key, secret or passphrase.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the global tracing subscriber.
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_tracing(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(SecretSanitizer);

    if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(MillisecondTimer)
            .with_target(true)
            .with_writer(std::io::stderr);

        registry.with(json_layer).try_init()?;
    } else {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_timer(MillisecondTimer)
            .with_target(false)
            .with_writer(std::io::stderr);

        registry.with(pretty_layer).try_init()?;
    }
    Ok(())
}

/// UTC timestamps with millisecond precision, same shape as OKX request timestamps.
#[derive(Debug, Clone)]
struct MillisecondTimer;

impl tracing_subscriber::fmt::time::FormatTime for MillisecondTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// A tracing layer that flags field values matching API credential patterns.
///
/// Patterns detected:
/// - Fields named `api_key`, `secret`, `passphrase`, `signature`, ...
/// - Base64-like strings of 32+ characters
/// - Hex strings of 40+ characters
#[derive(Debug, Clone)]
pub struct SecretSanitizer;

impl<S> Layer<S> for SecretSanitizer
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &span::Attributes<'_>,
        _id: &span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = SecretCheckVisitor::default();
        attrs.record(&mut visitor);
        if visitor.found_secret {
            tracing::warn!("Potential secret detected in span fields; log a fingerprint instead");
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = SecretCheckVisitor::default();
        event.record(&mut visitor);
        if visitor.found_secret {
            tracing::warn!("Potential secret detected in event fields; log a fingerprint instead");
        }
    }
}

#[derive(Default)]
struct SecretCheckVisitor {
    found_secret: bool,
}

/// Field names that always indicate secrets regardless of value.
const SENSITIVE_FIELD_NAMES: &[&str] = &[
    "api_key",
    "api_secret",
    "secret",
    "passphrase",
    "password",
    "token",
    "signature",
];

impl SecretCheckVisitor {
    /// Check if a string value looks like an API key or secret.
    fn looks_like_secret(value: &str) -> bool {
        if value.len() < 32 || value.contains(' ') {
            return false;
        }

        let alnum_count = value.chars().filter(|c| c.is_alphanumeric()).count();
        let ratio = alnum_count as f64 / value.len() as f64;
        if ratio <= 0.85 {
            return false;
        }

        let is_base64_like = value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=');
        let is_hex_like = value.len() >= 40 && value.chars().all(|c| c.is_ascii_hexdigit());

        is_base64_like || is_hex_like
    }
}

impl Visit for SecretCheckVisitor {
    fn record_debug(&mut self, field: &Field, _value: &dyn fmt::Debug) {
        if SENSITIVE_FIELD_NAMES.contains(&field.name()) {
            self.found_secret = true;
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if SENSITIVE_FIELD_NAMES.contains(&field.name()) || Self::looks_like_secret(value) {
            self.found_secret = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_secret_short_string() {
        assert!(!SecretCheckVisitor::looks_like_secret("NIGHTUSDT"));
    }

    #[test]
    fn test_looks_like_secret_api_key() {
        let fake_key = "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A";
        assert!(SecretCheckVisitor::looks_like_secret(fake_key));
    }

    #[test]
    fn test_looks_like_secret_base64_signature() {
        assert!(SecretCheckVisitor::looks_like_secret(
            "wgF7AZLpTbdV9EqX55M2EZIzGdOBDn6qsNMJ+0KkW5k="
        ));
    }

    #[test]
    fn test_looks_like_secret_normal_message() {
        assert!(!SecretCheckVisitor::looks_like_secret(
            "Fetched Bybit linear positions for NIGHTUSDT"
        ));
    }

    #[test]
    fn test_sensitive_field_names() {
        assert!(SENSITIVE_FIELD_NAMES.contains(&"api_key"));
        assert!(SENSITIVE_FIELD_NAMES.contains(&"passphrase"));
        assert!(SENSITIVE_FIELD_NAMES.contains(&"signature"));
        assert!(!SENSITIVE_FIELD_NAMES.contains(&"key_fingerprint"));
    }
}
