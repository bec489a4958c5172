use crate::http::{HttpRequest, Method};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Incomplete,
    InvalidFormat,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    RequestLine,
    Headers,
    Body,
    Complete,
}

/// Incremental, streaming HTTP/1.1 request parser. Bytes arrive across any
/// number of `feed()` calls, in any split, and the parser accumulates them
/// in its own internal buffer until a full request is decoded.
pub struct RequestParser {
    state: ParserState,
    buf: Vec<u8>,
    method: Method,
    full_route: String,
    route: String,
    version: String,
    headers: HashMap<String, String>,
    query_params: HashMap<String, String>,
    content_length: usize,
    request: Option<HttpRequest>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::RequestLine,
            buf: Vec::new(),
            method: Method::Unknown,
            full_route: String::new(),
            route: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            content_length: 0,
            request: None,
        }
    }

    /// Appends `bytes` to the internal buffer and advances the state
    /// machine as far as the currently-buffered data allows. Returns `true`
    /// once a full request is available via `take_request()`.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        self.buf.extend_from_slice(bytes);
        loop {
            match self.state {
                ParserState::RequestLine | ParserState::Headers => {
                    let Some(header_end) = find_subslice(&self.buf, b"\r\n\r\n") else {
                        return false;
                    };
                    let header_block: Vec<u8> = self.buf[..header_end].to_vec();
                    self.parse_header_block(&header_block);
                    self.buf.drain(..header_end + 4);
                    self.state = ParserState::Body;
                }
                ParserState::Body => {
                    if self.buf.len() < self.content_length {
                        return false;
                    }
                    let body = self.buf[..self.content_length].to_vec();
                    self.buf.drain(..self.content_length);
                    self.request = Some(HttpRequest {
                        method: self.method,
                        full_route: std::mem::take(&mut self.full_route),
                        route: std::mem::take(&mut self.route),
                        version: std::mem::take(&mut self.version),
                        headers: std::mem::take(&mut self.headers),
                        query_params: std::mem::take(&mut self.query_params),
                        path_params: HashMap::new(),
                        body,
                    });
                    self.state = ParserState::Complete;
                    return true;
                }
                ParserState::Complete => return true,
            }
        }
    }

    /// Takes the decoded request, if one is ready. Leaves the parser in
    /// `Complete` state until `reset()` is called.
    pub fn take_request(&mut self) -> Option<HttpRequest> {
        self.request.take()
    }

    /// Returns the parser to its initial state so it can decode the next
    /// request on a keep-alive connection. Any bytes still sitting in the
    /// internal buffer (pipelined ahead of this response) are *not*
    /// discarded: the parser never reads past the declared body length of
    /// the request it just completed, so whatever arrived after that body
    /// is still unconsumed and belongs to the next request.
    pub fn reset(&mut self) {
        self.state = ParserState::RequestLine;
        self.request = None;
        self.method = Method::Unknown;
        self.full_route.clear();
        self.route.clear();
        self.version.clear();
        self.headers.clear();
        self.query_params.clear();
        self.content_length = 0;
    }

    fn parse_header_block(&mut self, block: &[u8]) {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split("\r\n");

        if let Some(request_line) = lines.next() {
            let mut parts = request_line.split(' ').filter(|s| !s.is_empty());
            if let Some(method_tok) = parts.next() {
                self.method = Method::from_bytes(method_tok.as_bytes());
            }
            if let Some(target) = parts.next() {
                self.full_route = target.to_string();
                match target.find('?') {
                    Some(i) => {
                        self.route = target[..i].to_string();
                        self.query_params = parse_query_string(&target[i + 1..]);
                    }
                    None => {
                        self.route = target.to_string();
                    }
                }
            }
            if let Some(version) = parts.next() {
                self.version = version.to_string();
            }
        }

        for line in lines {
            if line.is_empty() {
                continue;
            }
            if let Some(colon) = line.find(':') {
                let name = line[..colon].to_string();
                let value = line[colon + 1..]
                    .trim_start_matches([' ', '\t'])
                    .to_string();
                self.headers.insert(name, value);
            }
            // Lines with no ':' are malformed and are skipped.
        }

        self.content_length = find_header_ci(&self.headers, "Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
    }
}

fn find_header_ci<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a query string on `&`, then each pair on the first `=`, decoding
/// both key and value.
pub fn parse_query_string(qs: &str) -> HashMap<String, String> {
    qs.split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Percent-decodes `%XX` sequences and turns `+` into a space. A `%` not
/// followed by two hex digits is passed through literally, per the
/// best-effort, never-panics contract of this parser.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() && is_hex(bytes[i + 1]) && is_hex(bytes[i + 2]) => {
                let hi = hex_val(bytes[i + 1]);
                let lo = hex_val(bytes[i + 2]);
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encodes everything outside of unreserved characters. Used by
/// tests to check the decode-after-encode round-trip law.
#[cfg(test)]
pub fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn is_hex(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_request_in_one_feed() {
        let mut parser = RequestParser::new();
        let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert!(parser.feed(raw));
        let req = parser.take_request().unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.route, "/hello");
        assert_eq!(req.full_route, "/hello?name=world");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.get_query_param("name"), Some("world"));
        assert_eq!(req.header("Host"), Some("example.com"));
    }

    #[test]
    fn incomplete_request_returns_false_until_complete() {
        let mut parser = RequestParser::new();
        assert!(!parser.feed(b"GET / HTTP/1.1\r\n"));
        assert!(!parser.feed(b"Host: x\r\n"));
        assert!(parser.feed(b"\r\n"));
        assert!(parser.take_request().is_some());
    }

    #[test]
    fn splitting_the_same_bytes_across_feed_calls_yields_same_request() {
        let raw: &[u8] = b"POST /items HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut whole = RequestParser::new();
        whole.feed(raw);
        let whole_req = whole.take_request().unwrap();

        let mut split = RequestParser::new();
        for chunk in raw.chunks(3) {
            split.feed(chunk);
        }
        let split_req = split.take_request().unwrap();

        assert_eq!(whole_req.route, split_req.route);
        assert_eq!(whole_req.body, split_req.body);
        assert_eq!(whole_req.body, b"hello");
    }

    #[test]
    fn missing_content_length_defaults_to_empty_body() {
        let mut parser = RequestParser::new();
        parser.feed(b"GET / HTTP/1.1\r\n\r\n");
        let req = parser.take_request().unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn non_integer_content_length_is_treated_as_zero() {
        let mut parser = RequestParser::new();
        parser.feed(b"GET / HTTP/1.1\r\nContent-Length: not-a-number\r\n\r\nignored");
        let req = parser.take_request().unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn reset_retains_pipelined_bytes_for_next_request() {
        let mut parser = RequestParser::new();
        let first = b"GET /a HTTP/1.1\r\n\r\n";
        let second = b"GET /b HTTP/1.1\r\n\r\n";
        let mut combined = first.to_vec();
        combined.extend_from_slice(second);

        assert!(parser.feed(&combined));
        let req1 = parser.take_request().unwrap();
        assert_eq!(req1.route, "/a");

        parser.reset();
        assert!(parser.feed(&[]));
        let req2 = parser.take_request().unwrap();
        assert_eq!(req2.route, "/b");
    }

    #[test]
    fn url_decode_handles_plus_and_percent_escapes() {
        assert_eq!(url_decode("a+b%20c"), "a b c");
        assert_eq!(url_decode("100%25"), "100%");
    }

    #[test]
    fn malformed_percent_sequence_passes_through_literally() {
        assert_eq!(url_decode("50%-off"), "50%-off");
        assert_eq!(url_decode("trailing%2"), "trailing%2");
    }

    #[test]
    fn decode_of_encode_is_identity_over_printable_ascii() {
        let original = "Hello, World! 100% fun & games.";
        assert_eq!(url_decode(&url_encode(original)), original);
    }
}
