//! Stdio and HTTP front ends for [`DashboardServer`].
//!
//! Stdio accepts both line-delimited JSON and `Content-Length` framed
//! messages and answers in the framing of each request. HTTP is a minimal
//! one-request-per-connection HTTP/1.1 loop.

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::{TcpListener, TcpStream};

use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use crate::server::{DashboardServer, ReportView};

/// Largest request body either transport will buffer.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
enum FrameError {
    #[error("body of {0} bytes exceeds the {MAX_BODY_BYTES} byte limit")]
    TooLarge(usize),

    #[error("{0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdioFrame {
    LineDelimited,
    ContentLength,
}

impl DashboardServer {
    pub fn serve_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.serve_io(stdin.lock(), stdout.lock())
    }

    /// Reads requests from `reader` until EOF, writing responses to `writer`.
    pub fn serve_io<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<()> {
        while let Some((payload, frame)) = next_stdio_message(&mut reader)? {
            let request = payload.and_then(|bytes| {
                serde_json::from_slice::<JsonRpcRequest>(&bytes)
                    .map_err(|err| format!("parse error: {err}"))
            });
            let response = match request {
                Ok(request) => self.handle_request(request),
                Err(message) => Some(JsonRpcResponse::error(Value::Null, PARSE_ERROR, message)),
            };
            if let Some(response) = response {
                write_stdio_response(&mut writer, &response, frame)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::print_stderr)]
    pub fn serve_http(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        eprintln!("scope3d http listening on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = self.handle_http_connection(stream) {
                        eprintln!("scope3d http request error: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("scope3d http accept error: {err}");
                }
            }
        }
        Ok(())
    }

    fn handle_http_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let response = match read_http_request(&stream) {
            Ok(Some(req)) => self.dispatch_http_request(&req),
            Ok(None) => return Ok(()),
            Err(FrameError::Io(err)) => return Err(err),
            Err(err) => rejected_request(&err),
        };
        write_http_response(&mut stream, &response)
    }

    fn dispatch_http_request(&self, req: &HttpRequest) -> HttpResponse {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => HttpResponse::json(200, &json!({"status": "ok"})),
            ("GET", "/report") => self.http_report(&req.query),
            ("POST", "/mcp") => self.http_rpc(&req.body),
            (_, "/health" | "/report" | "/mcp") => HttpResponse::json(
                405,
                &json!({
                    "error": "method_not_allowed",
                    "message": "supported endpoints: GET /health, GET /report, POST /mcp"
                }),
            ),
            _ => HttpResponse::json(404, &json!({"error": "not_found"})),
        }
    }

    fn http_rpc(&self, body: &[u8]) -> HttpResponse {
        let rpc: JsonRpcRequest = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(err) => {
                return HttpResponse::json(
                    400,
                    &json!({
                        "jsonrpc": "2.0",
                        "id": Value::Null,
                        "error": {"code": PARSE_ERROR, "message": format!("parse error: {err}")}
                    }),
                )
            }
        };
        match self.handle_request(rpc) {
            Some(response) => match serde_json::to_value(response) {
                Ok(payload) => HttpResponse::json(200, &payload),
                Err(_) => HttpResponse::json(
                    500,
                    &json!({"error": "internal_error", "message": "failed to serialize rpc response"}),
                ),
            },
            None => HttpResponse::empty(204),
        }
    }

    fn http_report(&self, query: &HashMap<String, String>) -> HttpResponse {
        let carbon_price = match query_param::<f64>(query, "carbon_price") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let top_n = match query_param::<usize>(query, "top_n") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        match self.report(carbon_price, top_n) {
            Ok(report) => match serde_json::to_value(ReportView::new(&report)) {
                Ok(payload) => HttpResponse::json(200, &payload),
                Err(_) => HttpResponse::json(
                    500,
                    &json!({"error": "internal_error", "message": "failed to serialize report"}),
                ),
            },
            Err(err) => HttpResponse::json(
                400,
                &json!({"error": "invalid_query", "message": err.to_string()}),
            ),
        }
    }
}

fn rejected_request(err: &FrameError) -> HttpResponse {
    let (status, code) = match err {
        FrameError::TooLarge(_) => (413, "payload_too_large"),
        _ => (400, "bad_request"),
    };
    HttpResponse::json(status, &json!({"error": code, "message": err.to_string()}))
}

fn query_param<T: std::str::FromStr>(
    query: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, HttpResponse> {
    let Some(raw) = query.get(name).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>().map(Some).map_err(|_| {
        HttpResponse::json(
            400,
            &json!({"error": "invalid_query", "message": format!("{name} is not a valid number: {raw}")}),
        )
    })
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[derive(Debug)]
struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, value: &Value) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: Vec::new(),
        }
    }
}

fn read_http_request(stream: &TcpStream) -> Result<Option<HttpRequest>, FrameError> {
    let mut reader = io::BufReader::new(stream.try_clone()?);
    parse_http_request(&mut reader)
}

fn parse_http_request<R: BufRead>(reader: &mut R) -> Result<Option<HttpRequest>, FrameError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let first = line.trim_end_matches(['\r', '\n']);
    if first.is_empty() {
        return Ok(None);
    }

    let mut parts = first.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(FrameError::Malformed(format!("invalid request line: {first}")));
    };
    let method = method.to_string();
    let (path, query) = parse_path_query(target);

    let declared = read_headers(reader, None)?;
    let body = read_body(reader, declared.unwrap_or(0))?;
    Ok(Some(HttpRequest {
        method,
        path,
        query,
        body,
    }))
}

fn write_http_response<W: Write>(writer: &mut W, response: &HttpResponse) -> io::Result<()> {
    write!(
        writer,
        "HTTP/1.1 {} {}\r\n",
        response.status,
        http_reason_phrase(response.status)
    )?;
    write!(
        writer,
        "Content-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.content_type,
        response.body.len()
    )?;
    writer.write_all(&response.body)?;
    writer.flush()
}

fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = raw.split_once('?').unwrap_or((raw, ""));
    let query = query_str
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (path.to_string(), query)
}

fn write_stdio_response<W: Write>(
    writer: &mut W,
    response: &JsonRpcResponse,
    frame: StdioFrame,
) -> io::Result<()> {
    match frame {
        StdioFrame::LineDelimited => {
            let serialized = serde_json::to_string(response)?;
            writeln!(writer, "{serialized}")?;
        }
        StdioFrame::ContentLength => {
            let serialized = serde_json::to_vec(response)?;
            write!(writer, "Content-Length: {}\r\n\r\n", serialized.len())?;
            writer.write_all(&serialized)?;
        }
    }
    writer.flush()
}

/// A raw message body, or a framing error to report, plus the framing to answer in.
type StdioMessage = (Result<Vec<u8>, String>, StdioFrame);

/// Skips blank lines; `None` at EOF.
fn next_stdio_message<R: BufRead>(reader: &mut R) -> io::Result<Option<StdioMessage>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !opens_header_block(trimmed) {
            return Ok(Some((
                Ok(trimmed.as_bytes().to_vec()),
                StdioFrame::LineDelimited,
            )));
        }
        let body = read_frame(reader, trimmed).map_err(|err| format!("invalid stdio frame: {err}"));
        return Ok(Some((body, StdioFrame::ContentLength)));
    }
}

/// Reads the rest of a framed stdio message whose first header is `first`.
/// An oversized body is skipped so the next frame starts cleanly.
fn read_frame<R: BufRead>(reader: &mut R, first: &str) -> Result<Vec<u8>, FrameError> {
    let len = read_headers(reader, Some(first))?
        .ok_or_else(|| FrameError::Malformed("missing content-length header".to_string()))?;
    match read_body(reader, len) {
        Err(FrameError::TooLarge(len)) => {
            let skip = u64::try_from(len).unwrap_or(u64::MAX);
            io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
            Err(FrameError::TooLarge(len))
        }
        other => other,
    }
}

fn opens_header_block(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, _)| {
        let name = name.trim();
        name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("content-type")
    })
}

/// Consumes header lines through the blank separator. `first` is a header
/// line the caller already took off the reader.
fn read_headers<R: BufRead>(
    reader: &mut R,
    first: Option<&str>,
) -> Result<Option<usize>, FrameError> {
    let mut declared = first.map(content_length).transpose()?.flatten();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(FrameError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "headers ended without a blank line",
            )));
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            return Ok(declared);
        }
        if let Some(len) = content_length(header)? {
            declared = Some(len);
        }
    }
}

/// `Ok(None)` for any header other than `Content-Length`.
fn content_length(header: &str) -> Result<Option<usize>, FrameError> {
    match header.split_once(':') {
        Some((name, value)) if name.trim().eq_ignore_ascii_case("content-length") => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| FrameError::Malformed(format!("invalid content-length: {}", value.trim()))),
        _ => Ok(None),
    }
}

/// Reads exactly `len` body bytes, refusing anything over [`MAX_BODY_BYTES`]
/// before allocating.
fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError> {
    if len > MAX_BODY_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let mut body = Vec::with_capacity(len);
    reader
        .by_ref()
        .take(u64::try_from(len).unwrap_or(u64::MAX))
        .read_to_end(&mut body)?;
    if body.len() < len {
        return Err(FrameError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("body ended after {} of {len} bytes", body.len()),
        )));
    }
    Ok(body)
}
