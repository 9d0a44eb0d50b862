//! Minimal HTTP/1.1 response reading for the scanner exchange.
//!
//! The request carries `Connection: close`, so the full response is read to
//! EOF and parsed in one pass. Bodies may arrive with a Content-Length,
//! chunked transfer coding, or delimited by connection close.

use std::collections::HashMap;

use crate::AvError;

/// Status and decoded body of the scanner's response.
#[derive(Debug, Clone)]
pub struct ScanResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub(crate) fn parse(raw: &[u8]) -> Result<ScanResponse, AvError> {
    let header_end = find(raw, b"\r\n\r\n")
        .ok_or_else(|| AvError::Service("truncated response from antivirus service".into()))?;

    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| AvError::Service("non-UTF-8 response head from antivirus service".into()))?;
    let mut lines = head.split("\r\n");

    let status_line = lines
        .next()
        .ok_or_else(|| AvError::Service("empty response from antivirus service".into()))?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            AvError::Service(format!("malformed status line: {:?}", status_line))
        })?;

    let headers: HashMap<String, String> = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect();

    let after = &raw[header_end + 4..];
    let body = if headers
        .get("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        decode_chunked(after)?
    } else if let Some(length) = headers.get("content-length") {
        let length: usize = length
            .parse()
            .map_err(|_| AvError::Service("invalid Content-Length in response".into()))?;
        if after.len() < length {
            return Err(AvError::Service("truncated response body".into()));
        }
        after[..length].to_vec()
    } else {
        after.to_vec()
    };

    Ok(ScanResponse { status, body })
}

fn decode_chunked(mut raw: &[u8]) -> Result<Vec<u8>, AvError> {
    let mut body = Vec::new();
    loop {
        let line_end = find(raw, b"\r\n")
            .ok_or_else(|| AvError::Service("truncated chunked response body".into()))?;
        let size_line = std::str::from_utf8(&raw[..line_end])
            .map_err(|_| AvError::Service("malformed chunk size line".into()))?;
        // Strip any chunk extension.
        let size_str = size_line.split(';').next().unwrap_or(size_line).trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| AvError::Service(format!("malformed chunk size: {:?}", size_str)))?;

        raw = &raw[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        if raw.len() < size + 2 {
            return Err(AvError::Service("truncated chunked response body".into()));
        }
        body.extend_from_slice(&raw[..size]);
        raw = &raw[size + 2..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
