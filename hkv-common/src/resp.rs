//! # RESP2 reply encoding and inline command parsing
//!
//! The client-facing wire (Router line-mode, and the Storage Node listener
//! it proxies to) carries commands as a single whitespace-separated text
//! line and replies as RESP2 values. This mirrors the source: the Node
//! Manager's `executeCommand` takes a plain command line, and the Router's
//! proxy is a raw byte pump that never reparses what it forwards, so both
//! ends of that pump have to agree on the same inline-text request framing.

use crate::error::{HkvError, RespErrorKind};

/// `+<text>\r\n`
pub fn simple(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 3);
    buf.push(b'+');
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// `-<text>\r\n`
pub fn error(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 3);
    buf.push(b'-');
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Formats an `HkvError` the same way regardless of call site.
pub fn error_for(err: &HkvError) -> Vec<u8> {
    let text = match err.resp_kind() {
        RespErrorKind::Protocol => err.to_string(),
        RespErrorKind::NotFound => {
            if matches!(err, HkvError::NotFound(msg) if msg == "tenant") {
                "ERR tenant not found".to_string()
            } else {
                format!("ERR {err}")
            }
        }
        RespErrorKind::Quota => "ERR OOM command not allowed when used memory > 'maxmemory'".to_string(),
        RespErrorKind::TypeError => "ERR value is not an integer or out of range".to_string(),
        RespErrorKind::Backpressure => "ERR server busy".to_string(),
        RespErrorKind::Generic => format!("ERR {err}"),
    };
    error(&text)
}

/// `:<n>\r\n`
pub fn integer(value: i64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(b':');
    buf.extend_from_slice(value.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// `$<len>\r\n<bytes>\r\n`
pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 16);
    buf.push(b'$');
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

/// `$-1\r\n`
pub fn null_bulk() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

/// `*<n>\r\n` followed by each element's own bulk-string framing.
pub fn array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(b'*');
    buf.extend_from_slice(items.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for item in items {
        buf.extend_from_slice(&bulk(item));
    }
    buf
}

/// Splits one command line into whitespace-separated arguments.
///
/// No quoting is supported; this matches the source's parser, which splits
/// on ASCII whitespace only.
pub fn split_command_line(line: &str) -> Vec<String> {
    line.split_ascii_whitespace().map(str::to_string).collect()
}

/// Case-insensitive ASCII comparison, used for command-name matching
/// without allocating an uppercased copy per dispatch.
pub fn eq_ignore_ascii_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
