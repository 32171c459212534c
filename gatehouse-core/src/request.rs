//! Synthetic request: the readable side of an in-memory connection.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::normalize::{DEFAULT_BASE_HOST, RequestTarget, host_header, parse_url, path_and_query};
use crate::query::QueryMapping;

/// `user-agent` used when the caller does not provide one.
pub const DEFAULT_USER_AGENT: &str = "gatehouse";

/// Address reported by the mock socket when none is known.
pub const DEFAULT_REMOTE_ADDRESS: &str = "127.0.0.1";

// Gateways are not consistent about padding; accept both.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Text encoding of a body payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Plain UTF-8 text.
    #[default]
    Utf8,
    /// Base64-encoded bytes.
    Base64,
}

impl Encoding {
    /// Parse an encoding label such as `utf8` or `base64`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Encoding::Utf8),
            "base64" => Some(Encoding::Base64),
            _ => None,
        }
    }

    /// Label of this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Base64 => "base64",
        }
    }

    /// Decode `text` from this encoding into bytes.
    pub fn decode(&self, text: &str) -> Result<Bytes> {
        match self {
            Encoding::Utf8 => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Encoding::Base64 => Ok(Bytes::from(LENIENT_BASE64.decode(text.trim())?)),
        }
    }

    /// Encode bytes as text in this encoding.
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Base64 => STANDARD.encode(bytes),
        }
    }

    /// Number of bytes `text` decodes to, without decoding it.
    pub fn byte_length(&self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Base64 => {
                let significant = text.trim().trim_end_matches('=');
                significant.len() * 3 / 4
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chunk produced by reading a [`SyntheticRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestChunk {
    /// Raw bytes (no read encoding set).
    Bytes(Bytes),
    /// Text in the read encoding.
    Text(String),
}

/// Stand-in for the network socket behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSocket {
    /// Client address.
    pub remote_address: String,
    /// Always true.
    pub readable: bool,
    /// Always true.
    pub writable: bool,
}

impl MockSocket {
    /// Create a socket reporting `remote_address`.
    pub fn new(remote_address: impl Into<String>) -> Self {
        Self {
            remote_address: remote_address.into(),
            readable: true,
            writable: true,
        }
    }
}

/// Constructor arguments for a [`SyntheticRequest`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method (uppercased on construction).
    pub method: String,
    /// Request path and any object-style query.
    pub target: RequestTarget,
    /// Explicit query; wins over the target's query.
    pub query: QueryMapping,
    /// Base host for URL normalization.
    pub host: String,
    /// Client address for the mock socket.
    pub remote_address: String,
    /// Body payload in `encoding`.
    pub body: Option<String>,
    /// Encoding the body was supplied in.
    pub encoding: Encoding,
    /// Request headers, any case.
    pub headers: Vec<(String, String)>,
    /// Fallback `host` header value.
    pub authority: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            target: RequestTarget::new("/"),
            query: QueryMapping::new(),
            host: DEFAULT_BASE_HOST.to_string(),
            remote_address: DEFAULT_REMOTE_ADDRESS.to_string(),
            body: None,
            encoding: Encoding::Utf8,
            headers: Vec::new(),
            authority: None,
        }
    }
}

impl RequestOptions {
    /// Create options for `method` on `target`.
    pub fn new(method: impl Into<String>, target: impl Into<RequestTarget>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    /// Set the explicit query.
    pub fn query(mut self, query: QueryMapping) -> Self {
        self.query = query;
        self
    }

    /// Set the base host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the client address.
    pub fn remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = address.into();
        self
    }

    /// Set the body and its encoding.
    pub fn body(mut self, body: impl Into<String>, encoding: Encoding) -> Self {
        self.body = Some(body.into());
        self.encoding = encoding;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the fallback `host` header value.
    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }
}

/// Readable, single-shot request handed to a routing engine.
///
/// The body stays in the encoding it was supplied in until it is read.
pub struct SyntheticRequest {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    socket: MockSocket,
    body: Option<String>,
    body_encoding: Encoding,
    read_encoding: Option<Encoding>,
    consumed: bool,
    decorations: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl SyntheticRequest {
    /// Build a request from options.
    pub fn new(options: RequestOptions) -> Result<Self> {
        let url = parse_url(&options.host, &options.target, &options.query)?;

        let mut headers: HashMap<String, String> = options
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        headers
            .entry("user-agent".to_string())
            .or_insert_with(|| DEFAULT_USER_AGENT.to_string());

        if !headers.contains_key("host") {
            let host = options.authority.unwrap_or_else(|| host_header(&url));
            headers.insert("host".to_string(), host);
        }

        let body = options.body.filter(|b| !b.is_empty());

        // Gateways do not send content-length even when there is a body.
        if !headers.contains_key("content-length") {
            let length = body
                .as_deref()
                .map(|b| options.encoding.byte_length(b))
                .unwrap_or(0);
            headers.insert("content-length".to_string(), length.to_string());
        }

        Ok(Self {
            method: options.method.to_uppercase(),
            url: path_and_query(&url),
            headers,
            socket: MockSocket::new(options.remote_address),
            body,
            body_encoding: options.encoding,
            read_encoding: None,
            consumed: false,
            decorations: HashMap::new(),
        })
    }

    /// HTTP version; always `1.1`.
    pub fn http_version(&self) -> &'static str {
        "1.1"
    }

    /// Uppercased HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Normalized `path?query`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or("/")
    }

    /// Query string without the leading `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, q)| q)
    }

    /// Lowercase-keyed headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The mock socket.
    pub fn socket(&self) -> &MockSocket {
        &self.socket
    }

    /// Declared body length in bytes.
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Ask for the body as text in `encoding` instead of raw bytes.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.read_encoding = Some(encoding);
    }

    /// Check if the body has already been read.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Read the body.
    ///
    /// Yields the whole body as one chunk, then `None` forever after. When
    /// the read encoding matches the supplied encoding the payload is passed
    /// through without decoding.
    pub fn read(&mut self) -> Result<Option<RequestChunk>> {
        if self.consumed {
            return Ok(None);
        }
        self.consumed = true;

        let Some(body) = self.body.take() else {
            return Ok(None);
        };

        let chunk = match self.read_encoding {
            Some(enc) if enc == self.body_encoding => RequestChunk::Text(body),
            Some(enc) => RequestChunk::Text(enc.encode(&self.body_encoding.decode(&body)?)),
            None => RequestChunk::Bytes(self.body_encoding.decode(&body)?),
        };

        Ok(Some(chunk))
    }

    /// Read the whole body as decoded bytes, ignoring any read encoding.
    pub fn read_to_end(&mut self) -> Result<Bytes> {
        if self.consumed {
            return Ok(Bytes::new());
        }
        self.consumed = true;

        match self.body.take() {
            Some(body) => self.body_encoding.decode(&body),
            None => Ok(Bytes::new()),
        }
    }

    /// Attach a value that downstream handlers can look up by name.
    pub fn decorate<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.decorations.insert(name.into(), Box::new(value));
    }

    /// Look up a decoration by name and type.
    pub fn decoration<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.decorations.get(name)?.downcast_ref::<T>()
    }
}

impl fmt::Debug for SyntheticRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("socket", &self.socket)
            .field("body_encoding", &self.body_encoding)
            .field("consumed", &self.consumed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = SyntheticRequest::new(RequestOptions::new("get", "/hello")).unwrap();

        assert_eq!(req.method(), "GET");
        assert_eq!(req.url(), "/hello");
        assert_eq!(req.http_version(), "1.1");
        assert_eq!(req.header("host"), Some("localhost:80"));
        assert_eq!(req.header("user-agent"), Some(DEFAULT_USER_AGENT));
        assert_eq!(req.header("content-length"), Some("0"));
        assert_eq!(req.socket().remote_address, "127.0.0.1");
        assert!(req.socket().readable && req.socket().writable);
    }

    #[test]
    fn test_encoding_from_label() {
        assert_eq!(Encoding::from_label("utf8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_label("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_label("Base64"), Some(Encoding::Base64));
        assert_eq!(Encoding::from_label("hex"), None);
        assert_eq!(Encoding::from_label(Encoding::Base64.as_str()), Some(Encoding::Base64));
    }

    #[test]
    fn test_headers_are_lowercased_and_host_kept() {
        let opts = RequestOptions::new("POST", "/")
            .header("X-Custom", "1")
            .header("Host", "api.example.com");
        let req = SyntheticRequest::new(opts).unwrap();

        assert_eq!(req.headers().get("x-custom"), Some(&"1".to_string()));
        assert_eq!(req.header("HOST"), Some("api.example.com"));
    }

    #[test]
    fn test_authority_fallback() {
        let opts = RequestOptions::new("GET", "/").authority("example.org");
        let req = SyntheticRequest::new(opts).unwrap();
        assert_eq!(req.header("host"), Some("example.org"));
    }

    #[test]
    fn test_base64_body_decoded_on_read() {
        let opts = RequestOptions::new("POST", "/").body("aGVsbG8=", Encoding::Base64);
        let mut req = SyntheticRequest::new(opts).unwrap();

        assert_eq!(req.content_length(), 5);
        assert_eq!(
            req.read().unwrap(),
            Some(RequestChunk::Bytes(Bytes::from_static(b"hello")))
        );
        assert_eq!(req.read().unwrap(), None);
    }

    #[test]
    fn test_matching_encoding_passes_through() {
        let opts = RequestOptions::new("POST", "/").body("aGVsbG8=", Encoding::Base64);
        let mut req = SyntheticRequest::new(opts).unwrap();
        req.set_encoding(Encoding::Base64);

        assert_eq!(
            req.read().unwrap(),
            Some(RequestChunk::Text("aGVsbG8=".to_string()))
        );
    }

    #[test]
    fn test_other_encoding_is_decoded_first() {
        let opts = RequestOptions::new("POST", "/").body("aGVsbG8=", Encoding::Base64);
        let mut req = SyntheticRequest::new(opts).unwrap();
        req.set_encoding(Encoding::Utf8);

        assert_eq!(req.read().unwrap(), Some(RequestChunk::Text("hello".to_string())));
    }

    #[test]
    fn test_utf8_content_length_counts_bytes() {
        let opts = RequestOptions::new("POST", "/").body("héllo", Encoding::Utf8);
        let req = SyntheticRequest::new(opts).unwrap();
        assert_eq!(req.content_length(), 6);
    }

    #[test]
    fn test_invalid_base64_fails_on_read() {
        let opts = RequestOptions::new("POST", "/").body("***", Encoding::Base64);
        let mut req = SyntheticRequest::new(opts).unwrap();
        assert!(req.read().is_err());
    }

    #[test]
    fn test_read_to_end() {
        let opts = RequestOptions::new("POST", "/").body("{\"a\":1}", Encoding::Utf8);
        let mut req = SyntheticRequest::new(opts).unwrap();
        assert_eq!(req.read_to_end().unwrap(), Bytes::from_static(b"{\"a\":1}"));
        assert!(req.is_consumed());
        assert_eq!(req.read().unwrap(), None);
    }

    #[test]
    fn test_decorations() {
        let mut req = SyntheticRequest::new(RequestOptions::default()).unwrap();
        req.decorate("awsLambda", 42u32);

        assert_eq!(req.decoration::<u32>("awsLambda"), Some(&42));
        assert_eq!(req.decoration::<String>("awsLambda"), None);
        assert_eq!(req.decoration::<u32>("other"), None);
    }

    #[test]
    fn test_path_and_query_accessors() {
        let req = SyntheticRequest::new(RequestOptions::new("GET", "/a/b?x=1")).unwrap();
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query_string(), Some("x=1"));
    }
}
