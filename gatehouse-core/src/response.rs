//! Synthetic response: the writable side of an in-memory connection.
//!
//! The routing engine mutates status and headers and writes body chunks.
//! Nothing is streamed: every chunk is buffered until [`SyntheticResponse::end`]
//! concatenates them into an immutable [`FinishedResponse`] and resolves the
//! paired [`ResponseHandle`]. A response resolves exactly once, either with
//! the finished response or with a routing fault.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::date::utc_date;
use crate::error::{CoreError, Result};
use crate::headers::{HeaderEntry, HeaderStore, HeaderValue};

/// Gateway payload format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// REST-style payload (`1.0`, or no version given).
    #[default]
    V1,
    /// HTTP-API-style payload (`2.0`).
    V2,
}

impl ProtocolVersion {
    /// Parse the `version` field of a gateway event.
    pub fn from_version(version: Option<&str>) -> Self {
        match version {
            Some("2.0") => ProtocolVersion::V2,
            _ => ProtocolVersion::V1,
        }
    }

    /// Version label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1.0",
            ProtocolVersion::V2 => "2.0",
        }
    }
}

/// A body chunk written by the routing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Text chunk.
    Text(String),
    /// Binary chunk.
    Bytes(Bytes),
}

impl Chunk {
    /// Raw bytes of the chunk.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Text(s) => s.as_bytes(),
            Chunk::Bytes(b) => b,
        }
    }

    /// Check if this is a binary chunk.
    pub fn is_binary(&self) -> bool {
        matches!(self, Chunk::Bytes(_))
    }
}

impl From<&str> for Chunk {
    fn from(value: &str) -> Self {
        Chunk::Text(value.to_string())
    }
}

impl From<String> for Chunk {
    fn from(value: String) -> Self {
        Chunk::Text(value)
    }
}

impl From<Bytes> for Chunk {
    fn from(value: Bytes) -> Self {
        Chunk::Bytes(value)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(value: Vec<u8>) -> Self {
        Chunk::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Chunk {
    fn from(value: &[u8]) -> Self {
        Chunk::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Chunk {
    fn from(value: &[u8; N]) -> Self {
        Chunk::Bytes(Bytes::copy_from_slice(value))
    }
}

/// Arguments to [`SyntheticResponse::write_head`].
///
/// Accepts a bare status (`()`), a status message (`&str`), a header list,
/// or a `(message, headers)` pair.
#[derive(Debug, Clone, Default)]
pub struct Head {
    /// Status message; not forwarded to the gateway.
    pub message: Option<String>,
    /// Headers to set before the defaults are applied.
    pub headers: Vec<(String, HeaderValue)>,
}

impl From<()> for Head {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<&str> for Head {
    fn from(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            headers: Vec::new(),
        }
    }
}

impl<K, V> From<Vec<(K, V)>> for Head
where
    K: Into<String>,
    V: Into<HeaderValue>,
{
    fn from(headers: Vec<(K, V)>) -> Self {
        Self {
            message: None,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Head
where
    K: Into<String>,
    V: Into<HeaderValue>,
{
    fn from(headers: [(K, V); N]) -> Self {
        Self::from(Vec::from(headers))
    }
}

impl<K, V, const N: usize> From<(&str, [(K, V); N])> for Head
where
    K: Into<String>,
    V: Into<HeaderValue>,
{
    fn from((message, headers): (&str, [(K, V); N])) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::from(headers)
        }
    }
}

/// Lifecycle of a [`SyntheticResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Accepting header and body mutations.
    Open,
    /// Concatenating buffered chunks; no writes accepted.
    Finalizing,
    /// Final payload computed and completion signaled.
    Closed,
    /// The engine reported a fault.
    Errored,
}

/// Response construction options.
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    /// Payload version; decides where multiple cookies end up.
    pub version: ProtocolVersion,
    /// Advertised in a `keep-alive` header when set.
    pub keep_alive_timeout: Option<Duration>,
}

/// Immutable result of a finished response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedResponse {
    status_code: u16,
    headers: HashMap<String, String>,
    body: Bytes,
    has_binary: bool,
    cookies: Option<Vec<String>>,
    multi_value_headers: Option<HashMap<String, Vec<String>>>,
}

impl FinishedResponse {
    /// Status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Lowercase-keyed reply headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Content type without parameters, e.g. `text/html` for
    /// `text/html; charset=utf-8`.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or_default().trim())
    }

    /// Concatenated body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Check if any written chunk was binary.
    pub fn has_binary(&self) -> bool {
        self.has_binary
    }

    /// Cookies promoted out of the headers (payload version 2.0).
    pub fn cookies(&self) -> Option<&[String]> {
        self.cookies.as_deref()
    }

    /// Multi-value headers (payload version 1.0).
    pub fn multi_value_headers(&self) -> Option<&HashMap<String, Vec<String>>> {
        self.multi_value_headers.as_ref()
    }

    /// Render the body as base64 or as UTF-8 text.
    pub fn payload(&self, base64: bool) -> String {
        if self.body.is_empty() {
            return String::new();
        }

        if base64 {
            STANDARD.encode(&self.body)
        } else {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Check if the body is valid UTF-8.
    pub fn is_utf8(&self) -> bool {
        std::str::from_utf8(&self.body).is_ok()
    }
}

/// Outcome delivered to a [`ResponseHandle`].
pub type Completion = Result<FinishedResponse>;

/// Receiving end of a response's completion.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<Completion>,
}

impl ResponseHandle {
    /// Wait until the response is finished or fails.
    ///
    /// A response dropped without being finished counts as a routing fault.
    pub async fn finished(self) -> Result<FinishedResponse> {
        match self.rx.await {
            Ok(completion) => completion,
            Err(_) => Err(CoreError::Routing(
                "response dropped before it was finished".to_string(),
            )),
        }
    }
}

/// Writable sink handed to a routing engine.
pub struct SyntheticResponse {
    status_code: u16,
    status_message: Option<String>,
    headers: HeaderStore,
    chunks: Vec<Chunk>,
    has_binary: bool,
    options: ResponseOptions,
    state: ResponseState,
    completion: Option<oneshot::Sender<Completion>>,
    finished: Option<FinishedResponse>,
}

impl SyntheticResponse {
    /// Create a response and the handle that resolves when it finishes.
    pub fn new(options: ResponseOptions) -> (Self, ResponseHandle) {
        let (tx, rx) = oneshot::channel();
        let response = Self {
            status_code: 200,
            status_message: None,
            headers: HeaderStore::new(),
            chunks: Vec::new(),
            has_binary: false,
            options,
            state: ResponseState::Open,
            completion: Some(tx),
            finished: None,
        };
        (response, ResponseHandle { rx })
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ResponseState::Open => Ok(()),
            _ => Err(CoreError::AlreadyFinished),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResponseState {
        self.state
    }

    /// Check if the response is closed or errored.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ResponseState::Closed | ResponseState::Errored)
    }

    /// Status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Status message given to `write_head`, if any.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Set the status code.
    pub fn set_status(&mut self, status_code: u16) -> Result<()> {
        self.ensure_open()?;
        self.status_code = status_code;
        Ok(())
    }

    /// Check if a header is set (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Get the stored entry, including the name's original case.
    pub fn get_header_entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.headers.entry(name)
    }

    /// All headers, keyed by lowercase name.
    pub fn get_headers(&self) -> HashMap<String, HeaderValue> {
        self.headers.to_map()
    }

    /// Header names in their original case.
    pub fn get_header_names(&self) -> Vec<&str> {
        self.headers.original_names().collect()
    }

    /// Set a header, replacing any previous value.
    ///
    /// `transfer-encoding: chunked` is ignored: bodies are always buffered.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let value = value.into();

        if is_chunked_encoding(&name, &value) {
            trace!("ignoring transfer-encoding: chunked");
            return Ok(());
        }

        self.headers.set(name, value);
        Ok(())
    }

    /// Append a header value, keeping earlier values for the same name.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let value = value.into();

        if is_chunked_encoding(&name, &value) {
            trace!("ignoring transfer-encoding: chunked");
            return Ok(());
        }

        self.headers.append(name, value);
        Ok(())
    }

    /// Remove a header (case-insensitive).
    pub fn remove_header(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.headers.remove(name);
        Ok(())
    }

    /// Set the status, apply headers, then fill in `connection`,
    /// `keep-alive` and `date` unless they were set explicitly.
    pub fn write_head(&mut self, status_code: u16, head: impl Into<Head>) -> Result<()> {
        self.ensure_open()?;
        let head = head.into();

        self.status_code = status_code;
        self.status_message = head.message;

        for (name, value) in head.headers {
            self.set_header(name, value)?;
        }

        if !self.headers.contains("connection") {
            self.headers.set("connection", "keep-alive");
            if let Some(timeout) = self.options.keep_alive_timeout.filter(|t| !t.is_zero()) {
                self.headers
                    .set("keep-alive", format!("timeout={}", timeout.as_secs()));
            }
        }

        if !self.headers.contains("date") {
            self.headers.set("date", utc_date());
        }

        Ok(())
    }

    /// Buffer a body chunk.
    pub fn write(&mut self, chunk: impl Into<Chunk>) -> Result<()> {
        self.ensure_open()?;
        let chunk = chunk.into();
        self.has_binary |= chunk.is_binary();
        self.chunks.push(chunk);
        Ok(())
    }

    /// Write a final chunk, then finish.
    pub fn end_with(&mut self, chunk: impl Into<Chunk>) -> Result<()> {
        self.write(chunk)?;
        self.end()
    }

    /// Finish the response.
    ///
    /// The first call concatenates the buffered chunks and resolves the
    /// handle. Later calls leave the finished response untouched.
    pub fn end(&mut self) -> Result<()> {
        match self.state {
            ResponseState::Closed => return Ok(()),
            ResponseState::Open => {}
            _ => return Err(CoreError::AlreadyFinished),
        }

        self.state = ResponseState::Finalizing;
        let finished = self.finalize();
        self.state = ResponseState::Closed;

        debug!(
            status = finished.status_code,
            bytes = finished.body.len(),
            "response finished"
        );

        if let Some(tx) = self.completion.take() {
            // Receiver may be gone if the caller stopped waiting.
            let _ = tx.send(Ok(finished.clone()));
        }
        self.finished = Some(finished);
        Ok(())
    }

    /// Fail the response with a routing fault.
    ///
    /// Has no effect once the response is closed or already errored.
    pub fn destroy(&mut self, reason: impl Into<String>) {
        if self.state != ResponseState::Open {
            return;
        }

        let reason = reason.into();
        debug!(%reason, "response destroyed");
        self.state = ResponseState::Errored;
        self.chunks.clear();

        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(CoreError::Routing(reason)));
        }
    }

    /// The finished response, once [`end`](Self::end) has run.
    pub fn finished(&self) -> Option<&FinishedResponse> {
        self.finished.as_ref()
    }

    fn finalize(&mut self) -> FinishedResponse {
        let chunks = std::mem::take(&mut self.chunks);
        let body = match chunks.as_slice() {
            [] => Bytes::new(),
            [Chunk::Bytes(b)] => b.clone(),
            _ => {
                let mut buf = BytesMut::with_capacity(chunks.iter().map(|c| c.as_bytes().len()).sum());
                for chunk in &chunks {
                    buf.extend_from_slice(chunk.as_bytes());
                }
                buf.freeze()
            }
        };

        let mut headers = HashMap::with_capacity(self.headers.len());
        let mut cookies = None;
        let mut multi_value_headers = None;

        for (key, entry) in self.headers.iter() {
            if key == "set-cookie" && entry.value.len() > 1 {
                let values: Vec<String> = entry.value.values().into_iter().map(String::from).collect();
                match self.options.version {
                    ProtocolVersion::V2 => cookies = Some(values),
                    ProtocolVersion::V1 => {
                        multi_value_headers = Some(HashMap::from([(key.to_string(), values)]));
                    }
                }
                continue;
            }
            headers.insert(key.to_string(), entry.value.joined());
        }

        FinishedResponse {
            status_code: self.status_code,
            headers,
            body,
            has_binary: self.has_binary,
            cookies,
            multi_value_headers,
        }
    }
}

fn is_chunked_encoding(name: &str, value: &HeaderValue) -> bool {
    name.eq_ignore_ascii_case("transfer-encoding") && value.contains_ignore_case("chunked")
}

impl fmt::Debug for SyntheticResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticResponse")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("chunks", &self.chunks.len())
            .field("has_binary", &self.has_binary)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(version: ProtocolVersion) -> (SyntheticResponse, ResponseHandle) {
        SyntheticResponse::new(ResponseOptions {
            version,
            keep_alive_timeout: None,
        })
    }

    #[tokio::test]
    async fn test_text_chunks_are_joined() {
        let (mut res, handle) = response(ProtocolVersion::V1);
        res.write("hello, ").unwrap();
        res.end_with("world").unwrap();

        let finished = handle.finished().await.unwrap();
        assert_eq!(finished.status_code(), 200);
        assert_eq!(finished.payload(false), "hello, world");
        assert!(!finished.has_binary());
    }

    #[tokio::test]
    async fn test_binary_chunk_concatenates_bytes() {
        let (mut res, handle) = response(ProtocolVersion::V1);
        res.write("ab").unwrap();
        res.write(vec![0xffu8, 0x00]).unwrap();
        res.end().unwrap();

        let finished = handle.finished().await.unwrap();
        assert!(finished.has_binary());
        assert_eq!(finished.body().as_ref(), &[b'a', b'b', 0xff, 0x00]);
        assert_eq!(finished.payload(true), STANDARD.encode([b'a', b'b', 0xff, 0x00]));
    }

    #[test]
    fn test_empty_body_payload() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.end().unwrap();
        assert_eq!(res.finished().unwrap().payload(true), "");
        assert_eq!(res.finished().unwrap().payload(false), "");
    }

    #[test]
    fn test_end_is_idempotent() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.end_with("once").unwrap();
        let first = res.finished().cloned();

        res.end().unwrap();
        assert_eq!(res.finished().cloned(), first);
        assert_eq!(res.write("more"), Err(CoreError::AlreadyFinished));
        assert_eq!(res.set_header("x", "y"), Err(CoreError::AlreadyFinished));
    }

    #[tokio::test]
    async fn test_destroy_resolves_with_fault() {
        let (mut res, handle) = response(ProtocolVersion::V1);
        res.destroy("boom");

        assert_eq!(res.state(), ResponseState::Errored);
        assert_eq!(handle.finished().await, Err(CoreError::Routing("boom".to_string())));
        assert_eq!(res.end(), Err(CoreError::AlreadyFinished));
    }

    #[tokio::test]
    async fn test_destroy_after_end_is_ignored() {
        let (mut res, handle) = response(ProtocolVersion::V1);
        res.end_with("ok").unwrap();
        res.destroy("late");

        assert_eq!(res.state(), ResponseState::Closed);
        assert_eq!(handle.finished().await.unwrap().payload(false), "ok");
    }

    #[tokio::test]
    async fn test_dropped_response_is_a_fault() {
        let (res, handle) = response(ProtocolVersion::V1);
        drop(res);
        assert!(matches!(handle.finished().await, Err(CoreError::Routing(_))));
    }

    #[test]
    fn test_header_api_is_case_insensitive() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.set_header("X-Powered-By", "gatehouse").unwrap();

        assert!(res.has_header("x-powered-by"));
        assert_eq!(res.get_header("X-POWERED-BY"), Some(&HeaderValue::from("gatehouse")));
        assert_eq!(res.get_header_names(), vec!["X-Powered-By"]);
        assert!(res.get_headers().contains_key("x-powered-by"));

        res.remove_header("x-powered-by").unwrap();
        assert!(!res.has_header("X-Powered-By"));
    }

    #[test]
    fn test_get_header_entry_keeps_original_name() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.set_header("X-Request-Id", "abc").unwrap();

        let entry = res.get_header_entry("x-request-id").unwrap();
        assert_eq!(entry.name, "X-Request-Id");
        assert_eq!(entry.value, HeaderValue::from("abc"));
        assert!(res.get_header_entry("x-missing").is_none());
    }

    #[test]
    fn test_chunked_transfer_encoding_ignored() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.set_header("Transfer-Encoding", "chunked").unwrap();
        res.append_header("transfer-encoding", "gzip, chunked").unwrap();
        assert!(!res.has_header("transfer-encoding"));
    }

    #[test]
    fn test_write_head_defaults() {
        let (mut res, _handle) = SyntheticResponse::new(ResponseOptions {
            version: ProtocolVersion::V1,
            keep_alive_timeout: Some(Duration::from_millis(5500)),
        });
        res.write_head(201, [("Content-Type", "text/plain")]).unwrap();

        assert_eq!(res.status_code(), 201);
        assert_eq!(res.get_header("content-type"), Some(&HeaderValue::from("text/plain")));
        assert_eq!(res.get_header("connection"), Some(&HeaderValue::from("keep-alive")));
        assert_eq!(res.get_header("keep-alive"), Some(&HeaderValue::from("timeout=5")));
        assert!(res.has_header("date"));
    }

    #[test]
    fn test_write_head_keeps_explicit_values() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.write_head(
            404,
            ("Not Found", [("Connection", "close"), ("Date", "yesterday")]),
        )
        .unwrap();

        assert_eq!(res.status_message(), Some("Not Found"));
        assert_eq!(res.get_header("connection"), Some(&HeaderValue::from("close")));
        assert_eq!(res.get_header("date"), Some(&HeaderValue::from("yesterday")));
        assert!(!res.has_header("keep-alive"));
    }

    #[test]
    fn test_write_head_message_only() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.write_head(204, "No Content").unwrap();
        assert_eq!(res.status_code(), 204);
        assert_eq!(res.get_header("connection"), Some(&HeaderValue::from("keep-alive")));
        assert!(!res.has_header("keep-alive"));
    }

    #[test]
    fn test_multiple_cookies_v2_become_cookie_list() {
        let (mut res, _handle) = response(ProtocolVersion::V2);
        res.append_header("Set-Cookie", "a=1").unwrap();
        res.append_header("Set-Cookie", "b=2").unwrap();
        res.end().unwrap();

        let finished = res.finished().unwrap();
        assert_eq!(finished.cookies(), Some(&["a=1".to_string(), "b=2".to_string()][..]));
        assert!(!finished.headers().contains_key("set-cookie"));
        assert!(finished.multi_value_headers().is_none());
    }

    #[test]
    fn test_multiple_cookies_v1_become_multi_value_header() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.set_header("set-cookie", vec!["a=1", "b=2"]).unwrap();
        res.end().unwrap();

        let finished = res.finished().unwrap();
        assert_eq!(
            finished.multi_value_headers().unwrap().get("set-cookie"),
            Some(&vec!["a=1".to_string(), "b=2".to_string()])
        );
        assert!(finished.cookies().is_none());
        assert!(!finished.headers().contains_key("set-cookie"));
    }

    #[test]
    fn test_single_cookie_is_ordinary_header() {
        let (mut res, _handle) = response(ProtocolVersion::V2);
        res.set_header("Set-Cookie", "only=1").unwrap();
        res.end().unwrap();

        let finished = res.finished().unwrap();
        assert_eq!(finished.header("set-cookie"), Some("only=1"));
        assert!(finished.cookies().is_none());
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let (mut res, _handle) = response(ProtocolVersion::V1);
        res.set_header("Content-Type", "application/json; charset=utf-8").unwrap();
        res.end().unwrap();
        assert_eq!(res.finished().unwrap().content_type(), Some("application/json"));
    }
}
