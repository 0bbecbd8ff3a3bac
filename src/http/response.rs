use crate::http::error::RespondError;
use crate::http::method::Method;
use crate::http::status::status_text;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};

/// Generic error message for when a route fails while handling a request.
pub const EXCEPTION_ERROR: &str = "an exception occurred while processing your request";

/// Generic error message for when no route is assigned to the requested path.
pub const NOT_A_METHOD_ERROR: &str = "No known method";

/// Generic error message for when the client sends bad data.
pub const MALFORMED_INPUT_ERROR: &str = "Malformed Input";

/// Generic status message for when everything is good.
pub const STATUS_GOOD: &str = "All systems are go";

const DEFAULT_ETC: &str = "now in Glorious Extra Color";

static SERVER_INFO: OnceCell<String> = OnceCell::new();

/// Install the `Server` header value. Only the first call wins; returns
/// whether this one did.
pub fn install_server_info(info: impl Into<String>) -> bool {
    SERVER_INFO.set(info.into()).is_ok()
}

/// The `Server` header value, `"{name} v{version} ({etc})"`.
pub fn server_info() -> &'static str {
    SERVER_INFO.get_or_init(|| {
        format!(
            "{} v{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            DEFAULT_ETC
        )
    })
}

/// Headers `serialize` always writes itself; extra headers can't override them.
const RESERVED_HEADERS: [&str; 5] = ["server", "content-type", "connection", "content-size", "content-length"];

fn is_reserved_header(key: &str) -> bool {
    RESERVED_HEADERS.iter().any(|reserved| key.trim().eq_ignore_ascii_case(reserved))
}

/// The writable side of a connection a response is sent on.
pub trait Transport: Write {
    fn is_open(&self) -> bool {
        true
    }

    /// Flush and close the output side.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Transport for TcpStream {
    fn is_open(&self) -> bool {
        self.peer_addr().is_ok()
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.shutdown(Shutdown::Write)
    }
}

impl Transport for Vec<u8> {}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// The server's answer to one request. Routes fill it in; the connection
/// unit sends it once with [`respond`](Response::respond).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    code: u16,
    body: Option<Vec<u8>>,
    mime_type: String,
    size: Option<u64>,
    headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            code: 200,
            body: None,
            mime_type: "text/plain".to_string(),
            size: None,
            headers: HashMap::new(),
        }
    }
}

impl Response {
    pub fn new() -> Response {
        Response::default()
    }

    /// Plain-text `message` with status `code`.
    pub fn message(&mut self, code: u16, message: impl Into<String>) {
        self.code = code;
        self.body = Some(message.into().into_bytes());
        self.mime_type = "text/plain".to_string();
    }

    /// Processed fine, nothing to send back.
    pub fn no_content(&mut self) {
        self.code = 204;
        self.body = Some(Vec::new());
        self.mime_type = String::new();
    }

    /// Log `err` and answer with a plain-text `message`.
    pub fn error(&mut self, code: u16, message: impl Into<String>, err: &dyn Display) {
        let message = message.into();
        tracing::error!(code, error = %err, "{}", message);
        self.message(code, message);
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = Some(body.into());
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = mime_type.into();
    }

    /// Explicit content size, if one was set instead of the body length.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = Some(size);
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, k: &str) -> Option<&str> {
        self.headers.get(k).map(|v| v.as_str())
    }

    pub fn set_header(&mut self, k: impl Into<String>, v: impl Into<String>) {
        self.headers.insert(k.into(), v.into());
    }

    /// Wire form of the response to a `method` request.
    ///
    /// A response whose body was never set goes out as `204 No Content`.
    /// `HEAD` requests and 204s get headers only.
    pub fn serialize(mut self, method: Method) -> Vec<u8> {
        if self.body.is_none() {
            self.no_content();
        }
        let body = self.body.take().unwrap_or_default();
        let content_size = self.size.unwrap_or(body.len() as u64);

        let mut resp_bytes = Vec::with_capacity(body.len() + (self.headers.len() + 6) * 32);
        resp_bytes.extend(format!("HTTP/1.1 {}\r\n", status_text(self.code)).as_bytes());
        resp_bytes.extend(format!("Server: {}\r\n", server_info()).as_bytes());
        resp_bytes.extend(format!("Content-Type: {}\r\n", self.mime_type).as_bytes());
        resp_bytes.extend(b"Connection: close\r\n");
        resp_bytes.extend(format!("Content-Size: {}\r\n", content_size).as_bytes());
        if self.code != 204 {
            resp_bytes.extend(format!("Content-Length: {}\r\n", content_size).as_bytes());
        }

        let mut headers: Vec<_> = self
            .headers
            .iter()
            .filter(|(key, _)| !is_reserved_header(key))
            .collect();
        headers.sort();
        for (key, value) in headers {
            resp_bytes.extend(format!("{}: {}\r\n", key, value).as_bytes());
        }
        resp_bytes.extend(b"\r\n");

        if method == Method::HEAD || self.code == 204 {
            return resp_bytes;
        }
        resp_bytes.extend(body);
        resp_bytes
    }

    /// Send the response and close the output side of `out`. The close is
    /// attempted even when writing fails.
    pub fn respond<T: Transport>(self, method: Method, out: &mut T) -> Result<(), RespondError> {
        let written = if out.is_open() {
            out.write_all(&self.serialize(method))
                .and_then(|_| out.flush())
                .map_err(RespondError::from)
        } else {
            Err(RespondError::ConnectionClosed)
        };
        let closed = out.close();

        written?;
        closed?;
        Ok(())
    }
}
