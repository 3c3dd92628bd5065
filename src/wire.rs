//! HTTP/1.1 text codec for fixture snapshots
//!
//! Requests are written exactly as they would go out on the wire and these
//! bytes double as the fingerprint input, so encoding must stay stable:
//! `Host` first, then every header in header-map order, a blank line and the
//! raw body. Nothing time-dependent is ever injected.
//!
//! Responses are read back with `httparse`. Both CRLF and bare LF line endings
//! are accepted so fixtures can be written by hand.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use httparse::Status;

use crate::{Error, Result};

/// Default limit on headers accepted when decoding a snapshot
pub const DEFAULT_MAX_HEADERS: usize = 128;

/// The request a replayed response answers, stored in the response extensions
#[derive(Debug, Clone)]
pub struct OriginRequest {
    /// Request method
    pub method: Method,
    /// Request target
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
}

impl OriginRequest {
    /// Capture the head of a request
    #[must_use]
    pub fn of<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Serialize a request to its canonical wire bytes
#[must_use]
pub fn encode_request(request: &Request<Bytes>) -> Vec<u8> {
    let body = request.body();
    let mut data = Vec::with_capacity(256 + body.len());

    let target = request
        .uri()
        .path_and_query()
        .map_or("/", http::uri::PathAndQuery::as_str);
    data.extend_from_slice(request.method().as_str().as_bytes());
    data.push(b' ');
    data.extend_from_slice(target.as_bytes());
    data.extend_from_slice(b" HTTP/1.1\r\n");

    // Host goes first, from the header if set, otherwise from the URI
    if let Some(host) = request.headers().get(HOST) {
        push_header(&mut data, "Host", host.as_bytes());
    } else if let Some(host) = host_of(request.uri()) {
        push_header(&mut data, "Host", host.as_bytes());
    }

    for (name, value) in request.headers() {
        if name == HOST {
            continue;
        }
        push_header(&mut data, name.as_str(), value.as_bytes());
    }

    data.extend_from_slice(b"\r\n");
    data.extend_from_slice(body);
    data
}

/// Serialize a buffered response to HTTP/1.1 text
///
/// The body is already decoded, so `Transfer-Encoding` is dropped and
/// `Content-Length` is made to describe the stored body. A declared length on
/// an empty body is kept as is, which covers `HEAD` and `304` answers.
/// Statuses that never carry a body (1xx, 204, 304) get no added length.
#[must_use]
pub fn encode_response(response: &Response<Bytes>) -> Vec<u8> {
    let body = response.body();
    let status = response.status();
    let mut data = Vec::with_capacity(256 + body.len());

    data.extend_from_slice(b"HTTP/1.1 ");
    data.extend_from_slice(status.as_str().as_bytes());
    data.push(b' ');
    data.extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
    data.extend_from_slice(b"\r\n");

    let body_len = body.len().to_string();
    let mut wrote_length = false;
    for (name, value) in response.headers() {
        if name == TRANSFER_ENCODING {
            continue;
        }
        if name == CONTENT_LENGTH {
            if wrote_length {
                continue;
            }
            wrote_length = true;
            if body.is_empty() {
                push_header(&mut data, name.as_str(), value.as_bytes());
            } else {
                push_header(&mut data, name.as_str(), body_len.as_bytes());
            }
            continue;
        }
        push_header(&mut data, name.as_str(), value.as_bytes());
    }
    if !wrote_length && !is_bodiless_status(status) {
        push_header(&mut data, CONTENT_LENGTH.as_str(), body_len.as_bytes());
    }

    data.extend_from_slice(b"\r\n");
    data.extend_from_slice(body);
    data
}

/// Parse a stored response snapshot into a response bound to `request`
///
/// # Errors
///
/// Returns [`Error::MalformedFixture`] if the bytes are not a complete HTTP
/// response
pub fn decode_response<B>(
    data: &[u8],
    request: &Request<B>,
    max_headers: usize,
) -> Result<Response<Bytes>> {
    let mut headers = vec![httparse::EMPTY_HEADER; max_headers];
    let mut parsed = httparse::Response::new(&mut headers);

    let head_len = match parsed.parse(data) {
        Ok(Status::Complete(len)) => len,
        Ok(Status::Partial) => return Err(malformed("response head is truncated")),
        Err(e) => return Err(malformed(format!("invalid response head: {e}"))),
    };

    let code = parsed
        .code
        .ok_or_else(|| malformed("missing status code"))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| malformed(format!("invalid status code {code}: {e}")))?;
    let header_map = collect_headers(parsed.headers)?;

    let rest = &data[head_len..];
    let body = if is_bodiless(request.method(), status) {
        Bytes::new()
    } else {
        read_body(rest, &header_map)?
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.version_mut() = version_of(parsed.version);
    *response.headers_mut() = header_map;
    response
        .extensions_mut()
        .insert(OriginRequest::of(request));

    Ok(response)
}

/// Parse a stored request snapshot
///
/// # Errors
///
/// Returns [`Error::MalformedFixture`] if the bytes are not a complete HTTP
/// request
pub fn decode_request(data: &[u8], max_headers: usize) -> Result<Request<Bytes>> {
    let mut headers = vec![httparse::EMPTY_HEADER; max_headers];
    let mut parsed = httparse::Request::new(&mut headers);

    let head_len = match parsed.parse(data) {
        Ok(Status::Complete(len)) => len,
        Ok(Status::Partial) => return Err(malformed("request head is truncated")),
        Err(e) => return Err(malformed(format!("invalid request head: {e}"))),
    };

    let method = parsed.method.ok_or_else(|| malformed("missing method"))?;
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| malformed(format!("invalid method '{method}': {e}")))?;
    let path = parsed.path.ok_or_else(|| malformed("missing request target"))?;
    let uri = path
        .parse::<Uri>()
        .map_err(|e| malformed(format!("invalid request target '{path}': {e}")))?;
    let header_map = collect_headers(parsed.headers)?;
    let body = read_body(&data[head_len..], &header_map)?;

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version_of(parsed.version);
    *request.headers_mut() = header_map;
    Ok(request)
}

fn push_header(data: &mut Vec<u8>, name: &str, value: &[u8]) {
    data.extend_from_slice(name.as_bytes());
    data.extend_from_slice(b": ");
    data.extend_from_slice(value);
    data.extend_from_slice(b"\r\n");
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(raw.len());
    for header in raw {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| malformed(format!("invalid header name '{}': {e}", header.name)))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|e| malformed(format!("invalid value for header '{name}': {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

fn version_of(minor: Option<u8>) -> Version {
    match minor {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

/// `host[:port]` of an absolute URI, without any userinfo
fn host_of(uri: &Uri) -> Option<String> {
    let host = uri.host()?;
    Some(match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn is_bodiless_status(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

fn is_bodiless(method: &Method, status: StatusCode) -> bool {
    method == Method::HEAD || is_bodiless_status(status)
}

/// Frame a message body the way HTTP/1.1 does
fn read_body(rest: &[u8], headers: &HeaderMap) -> Result<Bytes> {
    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked {
        return decode_chunked(rest);
    }

    match headers.get(CONTENT_LENGTH) {
        Some(value) => {
            let len = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| malformed(format!("invalid content-length {value:?}")))?;
            if rest.len() < len {
                return Err(malformed(format!(
                    "body is truncated: {} of {len} bytes",
                    rest.len()
                )));
            }
            Ok(Bytes::copy_from_slice(&rest[..len]))
        }
        None => Ok(Bytes::copy_from_slice(rest)),
    }
}

fn decode_chunked(mut buf: &[u8]) -> Result<Bytes> {
    let mut body = BytesMut::new();

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(buf) {
            Ok(Status::Complete(parsed)) => parsed,
            Ok(Status::Partial) => return Err(malformed("chunked body is truncated")),
            Err(_) => return Err(malformed("invalid chunk size")),
        };
        buf = &buf[consumed..];

        if size == 0 {
            break;
        }

        let size = usize::try_from(size).map_err(|_| malformed("chunk size overflows"))?;
        if buf.len() < size {
            return Err(malformed("chunked body is truncated"));
        }
        body.extend_from_slice(&buf[..size]);
        buf = &buf[size..];

        buf = buf
            .strip_prefix(b"\r\n")
            .or_else(|| buf.strip_prefix(b"\n"))
            .ok_or_else(|| malformed("missing chunk terminator"))?;
    }

    Ok(body.freeze())
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedFixture(reason.into())
}
