//! Proxy configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::normalize::DEFAULT_BASE_HOST;
use gatehouse_core::{QueryMapping, RequestTarget, parse_url};

use crate::error::{LambdaError, Result};
use crate::reply::DraftReply;

/// Decides whether a reply body must be base64-encoded.
pub type Base64Predicate = Arc<dyn Fn(&DraftReply<'_>) -> bool + Send + Sync>;

/// Default property name for the request decoration.
pub const DEFAULT_DECORATION_PROPERTY: &str = "awsLambda";

/// Configuration for a [`LambdaProxy`](crate::LambdaProxy).
#[derive(Clone)]
pub struct ProxyConfig {
    /// Content types whose bodies are always base64-encoded.
    pub binary_mime_types: Vec<String>,
    /// Embed the event and context as request headers.
    pub serialize_lambda_arguments: bool,
    /// Attach the invocation's event and context to each request.
    pub decorate_request: bool,
    /// Decoration key on the request.
    pub decoration_property_name: String,
    /// Forwarded into the invocation context unchanged.
    pub callback_waits_for_empty_event_loop: Option<bool>,
    /// Overrides the content-encoding heuristic.
    pub enforce_base64: Option<Base64Predicate>,
    /// Base for URL normalization.
    pub base_host: String,
    /// Advertised in a `keep-alive` header when set.
    pub keep_alive_timeout: Option<Duration>,
    /// Upper bound on waiting for the engine to finish a response.
    pub invocation_timeout: Option<Duration>,
    /// Enable request logging.
    pub log_requests: bool,
    /// Enable response logging.
    pub log_responses: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            binary_mime_types: Vec::new(),
            serialize_lambda_arguments: false,
            decorate_request: true,
            decoration_property_name: DEFAULT_DECORATION_PROPERTY.to_string(),
            callback_waits_for_empty_event_loop: None,
            enforce_base64: None,
            base_host: DEFAULT_BASE_HOST.to_string(),
            keep_alive_timeout: None,
            invocation_timeout: None,
            log_requests: true,
            log_responses: false,
        }
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("binary_mime_types", &self.binary_mime_types)
            .field("serialize_lambda_arguments", &self.serialize_lambda_arguments)
            .field("decorate_request", &self.decorate_request)
            .field("decoration_property_name", &self.decoration_property_name)
            .field(
                "callback_waits_for_empty_event_loop",
                &self.callback_waits_for_empty_event_loop,
            )
            .field("enforce_base64", &self.enforce_base64.as_ref().map(|_| "<fn>"))
            .field("base_host", &self.base_host)
            .field("keep_alive_timeout", &self.keep_alive_timeout)
            .field("invocation_timeout", &self.invocation_timeout)
            .field("log_requests", &self.log_requests)
            .field("log_responses", &self.log_responses)
            .finish()
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// Absent or unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        };

        Self {
            binary_mime_types: lookup("GATEHOUSE_BINARY_MIME_TYPES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            serialize_lambda_arguments: flag(
                "GATEHOUSE_SERIALIZE_LAMBDA_ARGUMENTS",
                defaults.serialize_lambda_arguments,
            ),
            decorate_request: flag("GATEHOUSE_DECORATE_REQUEST", defaults.decorate_request),
            decoration_property_name: lookup("GATEHOUSE_DECORATION_PROPERTY")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.decoration_property_name),
            keep_alive_timeout: millis("GATEHOUSE_KEEP_ALIVE_TIMEOUT_MS"),
            invocation_timeout: millis("GATEHOUSE_INVOCATION_TIMEOUT_MS"),
            ..defaults
        }
    }

    /// Set the binary content types.
    pub fn binary_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Embed the event and context as request headers.
    pub fn serialize_lambda_arguments(mut self, enabled: bool) -> Self {
        self.serialize_lambda_arguments = enabled;
        self
    }

    /// Attach the event and context to each request.
    pub fn decorate_request(mut self, enabled: bool) -> Self {
        self.decorate_request = enabled;
        self
    }

    /// Set the decoration key.
    pub fn decoration_property_name(mut self, name: impl Into<String>) -> Self {
        self.decoration_property_name = name.into();
        self
    }

    /// Set the value forwarded as `callbackWaitsForEmptyEventLoop`.
    pub fn callback_waits_for_empty_event_loop(mut self, value: bool) -> Self {
        self.callback_waits_for_empty_event_loop = Some(value);
        self
    }

    /// Override binary detection.
    pub fn enforce_base64<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DraftReply<'_>) -> bool + Send + Sync + 'static,
    {
        self.enforce_base64 = Some(Arc::new(predicate));
        self
    }

    /// Set the base host.
    pub fn base_host(mut self, host: impl Into<String>) -> Self {
        self.base_host = host.into();
        self
    }

    /// Set the keep-alive timeout.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = Some(timeout);
        self
    }

    /// Bound the wait for each response.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Enable request logging.
    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Enable response logging.
    pub fn log_responses(mut self, enabled: bool) -> Self {
        self.log_responses = enabled;
        self
    }

    /// Check that the configuration can serve requests.
    pub fn validate(&self) -> Result<()> {
        if self.decorate_request && self.decoration_property_name.is_empty() {
            return Err(LambdaError::Config(
                "decoration property name must not be empty".to_string(),
            ));
        }

        parse_url(&self.base_host, &RequestTarget::new("/"), &QueryMapping::new())
            .map_err(|err| LambdaError::Config(format!("invalid base host: {err}")))?;

        Ok(())
    }

    /// Check if `content_type` is on the binary allow-list.
    pub fn is_binary_mime_type(&self, content_type: &str) -> bool {
        self.binary_mime_types.iter().any(|t| t == content_type)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
