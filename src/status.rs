//! Numeric HTTP status codes to canonical reason phrases, grounded in
//! `original_source/include/http_status_code.hpp`.

pub struct HttpStatus;

impl HttpStatus {
    pub fn reason_phrase(code: u16) -> &'static str {
        match code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown Status",
        }
    }

    pub fn is_informational(code: u16) -> bool {
        (100..200).contains(&code)
    }

    pub fn is_success(code: u16) -> bool {
        (200..300).contains(&code)
    }

    pub fn is_redirection(code: u16) -> bool {
        (300..400).contains(&code)
    }

    pub fn is_client_error(code: u16) -> bool {
        (400..500).contains(&code)
    }

    pub fn is_server_error(code: u16) -> bool {
        (500..600).contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_canonical_reasons() {
        assert_eq!(HttpStatus::reason_phrase(200), "OK");
        assert_eq!(HttpStatus::reason_phrase(404), "Not Found");
        assert_eq!(HttpStatus::reason_phrase(500), "Internal Server Error");
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(HttpStatus::reason_phrase(499), "Unknown Status");
    }

    #[test]
    fn classification_predicates_partition_ranges() {
        assert!(HttpStatus::is_success(200));
        assert!(!HttpStatus::is_success(404));
        assert!(HttpStatus::is_client_error(404));
        assert!(HttpStatus::is_server_error(500));
    }
}
