use crate::http::BUFFER_SIZE;
use crate::http::error::ProtocolError;
use crate::http::form::{self, Params};
use crate::http::method::Method;
use std::cmp::min;
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

/// One parsed HTTP exchange.
///
/// `segments` and `path` start out covering the whole target and shrink as the
/// [`Router`](crate::http::Router) consumes the handler segment; `full_path`
/// never changes. Path and query parameters, and the variadic tail captured by
/// a `{*}` route, are merged in during dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    protocol: String,
    request_line: String,
    full_path: String,
    path: String,
    segments: Vec<String>,
    headers: HashMap<String, String>,
    params: Params,
    varargs: Vec<String>,
    body: Vec<u8>,
    raw: String,
}

impl Request {
    /// Read one request off `rdr`.
    ///
    /// Leading blank lines are skipped. Headers run until the first empty
    /// line or end of stream. A body is only read for `POST` requests that
    /// carry `Content-Length`, and is merged into the parameters as form data.
    pub fn parse(rdr: &mut impl BufRead) -> Result<Request, ProtocolError> {
        let request_line = loop {
            match read_line(rdr)? {
                None => return Err(ProtocolError::MalformedRequestLine(String::new())),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };

        let parts: Vec<&str> = request_line.trim().split(' ').collect();
        let (method, target, protocol) = match parts[..] {
            [method_raw, target, protocol] => {
                let method = Method::from_str(&method_raw.to_uppercase())
                    .map_err(|_| ProtocolError::UnknownMethod(method_raw.to_string()))?;
                (method, target.to_string(), protocol.to_string())
            }
            _ => return Err(ProtocolError::MalformedRequestLine(request_line.clone())),
        };

        let mut raw = format!("{}\n", request_line);
        let mut request = Request {
            method,
            protocol,
            request_line,
            full_path: String::new(),
            path: String::new(),
            segments: Vec::new(),
            headers: HashMap::new(),
            params: Params::new(),
            varargs: Vec::new(),
            body: Vec::new(),
            raw: String::new(),
        };
        request.set_full_path(&target);

        while let Some(line) = read_line(rdr)? {
            if line.is_empty() {
                break;
            }
            raw.push_str(&line);
            raw.push('\n');

            let (k, v) = line
                .split_once(": ")
                .ok_or_else(|| ProtocolError::MalformedHeader(line.clone()))?;
            request.headers.insert(k.to_lowercase(), v.to_string());
        }

        if request.method == Method::POST {
            if let Some(content_length_raw) = request.header("content-length") {
                let content_length: usize = content_length_raw
                    .trim()
                    .parse()
                    .map_err(|_| ProtocolError::InvalidContentLength(content_length_raw.to_string()))?;
                request.body = read_content(rdr, content_length)?;

                let data = String::from_utf8_lossy(&request.body).into_owned();
                raw.push_str(&data);
                request.params.extend(form::parse_form(&data));
            }
        }

        request.raw = raw;
        Ok(request)
    }

    /// Split `target` into segments, pulling any query string into the params.
    fn set_full_path(&mut self, target: &str) {
        self.full_path = target.to_string();
        self.path = target.to_string();

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        self.segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect();

        if let Some(query) = query {
            self.params.extend(form::parse_query(query));
        }
    }

    /// Drop the first remaining segment, returning it.
    pub(crate) fn consume_segment(&mut self) -> Option<String> {
        if self.segments.is_empty() {
            return None;
        }
        let segment = self.segments.remove(0);

        let rest = self.path.trim_start_matches('/');
        self.path = rest.strip_prefix(segment.as_str()).unwrap_or(rest).to_string();
        Some(segment)
    }

    pub(crate) fn merge_params(&mut self, params: impl IntoIterator<Item = (String, String)>) {
        self.params.extend(params.into_iter().map(|(k, v)| (k, Some(v))));
    }

    pub(crate) fn merge_varargs(&mut self, varargs: impl IntoIterator<Item = String>) {
        self.varargs.extend(varargs);
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_method(&self, method: Method) -> bool {
        self.method == method
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    /// The request target exactly as sent, query string included.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// What is left of the target once the router has consumed the handler
    /// segment.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, k: &str) -> Option<&str> {
        self.headers.get(&k.to_lowercase()).map(|v| v.as_str())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of a path, query or form parameter. Bare query tokens have no
    /// value; use [`has_param`](Self::has_param) for those.
    pub fn param(&self, k: &str) -> Option<&str> {
        self.params.get(k).and_then(|v| v.as_deref())
    }

    pub fn has_param(&self, k: &str) -> bool {
        self.params.contains_key(k)
    }

    pub fn varargs(&self) -> &[String] {
        &self.varargs
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The request as read: request line, header lines and any body.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.full_path, self.protocol)
    }
}

/// Next line without its terminator, or `None` at end of stream.
fn read_line(rdr: &mut impl BufRead) -> Result<Option<String>, ProtocolError> {
    let mut buf = Vec::new();
    if rdr.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.ends_with(b"\n") {
        buf.pop();
    }
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

fn read_content(rdr: &mut impl BufRead, content_length: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut content = Vec::with_capacity(min(content_length, BUFFER_SIZE * 64));
    let mut remaining = content_length;
    let mut buf = [0u8; BUFFER_SIZE];

    while remaining > 0 {
        let slice_to_read = &mut buf[..min(BUFFER_SIZE, remaining)];
        let bytes_read = rdr.read(slice_to_read)?;
        if bytes_read == 0 {
            return Err(ProtocolError::ShortBody {
                expected: content_length,
                received: content_length - remaining,
            });
        }
        content.extend_from_slice(&slice_to_read[..bytes_read]);
        remaining -= bytes_read;
    }
    Ok(content)
}
