use crate::mime::MimeType;
use crate::status::HttpStatus;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Delete,
    Put,
    Unknown,
}

impl Method {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"OPTIONS" => Method::Options,
            b"POST" => Method::Post,
            b"DELETE" => Method::Delete,
            b"PUT" => Method::Put,
            _ => Method::Unknown,
        }
    }
}

/// A fully decoded HTTP request. Owned rather than borrowed from the read
/// buffer: it is handed to the router and then to a handler, and by then the
/// connection's buffer may already have been reused for the next read.
pub struct HttpRequest {
    pub method: Method,
    /// Request target exactly as sent, including any query string.
    pub full_route: String,
    /// Request target with the query string stripped off.
    pub route: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(|s| s.as_str())
    }

    /// Case-insensitive header lookup, matching HTTP's own header-name
    /// semantics even though the backing map's keys are stored case-as-sent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(self, mime: MimeType) -> Self {
        self.header("Content-Type", mime.as_str())
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200).content_type(MimeType::TextPlain).body(body)
    }

    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200)
            .content_type(MimeType::ApplicationJson)
            .body(body)
    }

    pub fn not_found() -> Self {
        Self::new(404)
            .content_type(MimeType::TextPlain)
            .body(b"Route not found".to_vec())
    }

    pub fn bad_request() -> Self {
        Self::new(400)
            .content_type(MimeType::TextPlain)
            .body(b"Bad Request".to_vec())
    }

    pub fn internal_error() -> Self {
        Self::new(500)
            .content_type(MimeType::TextPlain)
            .body(b"Internal Server Error".to_vec())
    }

    /// Renders the status line, headers, and body as wire bytes. Inserts a
    /// `Content-Length` header when the caller didn't set one.
    pub fn serialize(&self) -> Vec<u8> {
        let reason = HttpStatus::reason_phrase(self.status);
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, reason).as_bytes());

        let has_content_length = self
            .headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-length"));
        for (k, v) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        if !has_content_length && !self.body.is_empty() {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_inserts_content_length_when_absent() {
        let resp = HttpResponse::ok("hi");
        let bytes = resp.serialize();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn serialize_respects_explicit_content_length() {
        let resp = HttpResponse::new(204).header("Content-Length", "0");
        let text = String::from_utf8(resp.serialize()).unwrap();
        assert_eq!(text.matches("Content-Length").count(), 1);
    }

    #[test]
    fn not_found_body_matches_contract() {
        let resp = HttpResponse::not_found();
        assert_eq!(resp.body, b"Route not found");
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn serialize_omits_content_length_for_empty_body_with_no_explicit_header() {
        let resp = HttpResponse::new(204);
        let text = String::from_utf8(resp.serialize()).unwrap();
        assert!(!text.contains("Content-Length"));
    }
}
