use crate::parser::RequestParser;

/// Size of the scratch buffer a single readable event reads into. The real
/// accumulated request state lives in `parser`; this is just the transfer
/// buffer for one `read()` syscall.
pub const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Reading,
    Writing,
    Closing,
}

pub struct Connection {
    pub fd: i32,
    pub state: ConnState,
    pub keep_alive: bool,
    pub parser: RequestParser,
    pub read_buffer: Vec<u8>,
    pub write_buffer: Vec<u8>,
    pub write_pos: usize,
    pub last_activity: u64,
    pub requests_served: u64,
}

impl Connection {
    pub fn new(fd: i32, now: u64) -> Self {
        Self {
            fd,
            state: ConnState::Reading,
            keep_alive: false,
            parser: RequestParser::new(),
            read_buffer: vec![0u8; READ_CHUNK],
            write_buffer: Vec::new(),
            write_pos: 0,
            last_activity: now,
            requests_served: 0,
        }
    }

    pub fn is_idle_past(&self, now: u64, timeout_secs: u64) -> bool {
        self.state == ConnState::Reading && now.saturating_sub(self.last_activity) > timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_starts_in_reading_state() {
        let conn = Connection::new(7, 1000);
        assert_eq!(conn.state, ConnState::Reading);
        assert_eq!(conn.requests_served, 0);
        assert!(!conn.keep_alive);
    }

    #[test]
    fn idle_past_only_applies_while_reading() {
        let mut conn = Connection::new(7, 1000);
        assert!(!conn.is_idle_past(1000, 30));
        assert!(conn.is_idle_past(1031, 30));

        conn.state = ConnState::Writing;
        assert!(!conn.is_idle_past(1031, 30));
    }
}
