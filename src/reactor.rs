use crate::conn::{ConnState, Connection};
use crate::error::HttpdResult;
use crate::http::HttpResponse;
use crate::router::Router;
use crate::slab::ConnectionSlab;
use crate::syscalls::{self, Epoll, ReadOutcome, WriteOutcome, epoll_event, EPOLLIN, EPOLLOUT};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Token identifying the handoff pipe's read end in this reactor's epoll
/// set, distinct from any connection slab index.
const PIPE_TOKEN: u64 = u64::MAX;
const MAX_EVENTS: usize = 1024;
const POLL_TIMEOUT_MS: i32 = 100;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// One of the N worker threads that own an epoll/kqueue set and a private
/// connection slab. Connections arrive over `pipe_read_fd`, handed off by
/// the acceptor thread; from then on this reactor owns the connection's
/// full lifecycle until it closes.
pub struct Reactor {
    id: usize,
    epoll: Epoll,
    slab: ConnectionSlab,
    router: Arc<Router>,
    pipe_read_fd: i32,
    keep_alive_timeout_secs: u64,
    last_sweep: u64,
}

impl Reactor {
    pub fn new(
        id: usize,
        router: Arc<Router>,
        pipe_read_fd: i32,
        keep_alive_timeout_secs: u64,
    ) -> HttpdResult<Self> {
        let epoll = Epoll::new()?;
        epoll.add(pipe_read_fd, PIPE_TOKEN, EPOLLIN)?;
        Ok(Self {
            id,
            epoll,
            slab: ConnectionSlab::new(),
            router,
            pipe_read_fd,
            keep_alive_timeout_secs,
            last_sweep: now_secs(),
        })
    }

    pub fn run(&mut self, running: Arc<AtomicBool>) {
        let mut events = vec![epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

        while running.load(Ordering::Acquire) {
            let n = match self.epoll.wait(&mut events, POLL_TIMEOUT_MS) {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(reactor = self.id, error = %e, "epoll wait failed");
                    continue;
                }
            };

            for event in events.iter().take(n) {
                let token = event.u64;
                if token == PIPE_TOKEN {
                    self.drain_new_connections();
                    continue;
                }
                let idx = token as usize;
                let is_read = (event.events & EPOLLIN as u32) != 0;
                let is_write = (event.events & EPOLLOUT as u32) != 0;
                self.service(idx, is_read, is_write);
            }

            self.sweep_timeouts();
        }

        self.shutdown_all();
    }

    fn drain_new_connections(&mut self) {
        loop {
            match syscalls::recv_fd_from_pipe(self.pipe_read_fd) {
                Ok(Some(fd)) => self.add_connection(fd),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(reactor = self.id, error = %e, "pipe read failed");
                    break;
                }
            }
        }
    }

    fn add_connection(&mut self, fd: i32) {
        let conn = Connection::new(fd, now_secs());
        let idx = self.slab.allocate(conn);
        if let Err(e) = self.epoll.add(fd, idx as u64, EPOLLIN) {
            tracing::warn!(reactor = self.id, error = %e, "failed to register new connection");
            self.slab.free(idx);
            unsafe {
                libc::close(fd);
            }
        } else {
            tracing::debug!(reactor = self.id, fd, "new connection accepted");
        }
    }

    fn service(&mut self, idx: usize, is_read: bool, is_write: bool) {
        if is_read {
            self.handle_read(idx);
        }
        if is_write && self.slab.get(idx).is_some() {
            self.handle_write(idx);
        }
    }

    /// Edge-triggered read: drains the socket until it reports WouldBlock,
    /// feeding each chunk to the connection's parser as it arrives. Reads
    /// into the connection's own scratch buffer rather than a fresh
    /// allocation per call.
    fn handle_read(&mut self, idx: usize) {
        loop {
            let fd = match self.slab.get(idx) {
                Some(conn) => conn.fd,
                None => return,
            };

            let outcome = {
                let conn = match self.slab.get_mut(idx) {
                    Some(c) => c,
                    None => return,
                };
                syscalls::read_nonblocking(fd, &mut conn.read_buffer)
            };

            let outcome = match outcome {
                Ok(o) => o,
                Err(_) => {
                    self.close_conn(idx);
                    return;
                }
            };

            match outcome {
                ReadOutcome::WouldBlock => return,
                ReadOutcome::Eof => {
                    self.close_conn(idx);
                    return;
                }
                ReadOutcome::Data(n) => {
                    let conn = match self.slab.get_mut(idx) {
                        Some(c) => c,
                        None => return,
                    };
                    conn.last_activity = now_secs();
                    let complete = conn.parser.feed(&conn.read_buffer[..n]);
                    if complete {
                        self.dispatch(idx);
                        if self.slab.get(idx).is_none() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Runs the router/handler for a fully parsed request, then either
    /// starts writing the response or, if it is already buffered as a
    /// pipelined write in progress, leaves the connection be.
    fn dispatch(&mut self, idx: usize) {
        let conn = match self.slab.get_mut(idx) {
            Some(c) => c,
            None => return,
        };

        let mut request = match conn.parser.take_request() {
            Some(r) => r,
            None => return,
        };

        conn.keep_alive = should_keep_alive(&request);
        conn.requests_served += 1;

        let router = self.router.clone();
        let response = match router.match_route(&mut request) {
            Some(handler) => {
                match panic::catch_unwind(AssertUnwindSafe(|| handler(&request))) {
                    Ok(resp) => resp,
                    Err(_) => {
                        tracing::error!(reactor = self.id, route = %request.route, "handler panicked");
                        HttpResponse::internal_error()
                    }
                }
            }
            None => HttpResponse::not_found(),
        };

        let conn = match self.slab.get_mut(idx) {
            Some(c) => c,
            None => return,
        };

        let response = response.header(
            "Connection",
            if conn.keep_alive { "keep-alive" } else { "close" },
        );
        conn.write_buffer = response.serialize();
        conn.write_pos = 0;
        conn.state = ConnState::Writing;
        conn.parser.reset();

        if let Err(e) = self.epoll.modify(conn.fd, idx as u64, EPOLLOUT) {
            tracing::warn!(reactor = self.id, error = %e, "failed to switch to write interest");
        }

        self.handle_write(idx);
    }

    /// Edge-triggered write: sends as much of the buffered response as the
    /// socket will take, tracking the unwritten tail across WouldBlock.
    fn handle_write(&mut self, idx: usize) {
        loop {
            let (fd, remaining) = match self.slab.get(idx) {
                Some(conn) => (conn.fd, &conn.write_buffer[conn.write_pos..]),
                None => return,
            };

            if remaining.is_empty() {
                self.finish_write(idx);
                return;
            }

            match syscalls::write_nonblocking(fd, remaining) {
                Ok(WriteOutcome::Wrote(n)) => {
                    if let Some(conn) = self.slab.get_mut(idx) {
                        conn.write_pos += n;
                        conn.last_activity = now_secs();
                    }
                }
                Ok(WriteOutcome::WouldBlock) => return,
                Err(_) => {
                    self.close_conn(idx);
                    return;
                }
            }
        }
    }

    /// The response has been fully flushed: either tear the connection down
    /// or reset it for the next request on the same socket, completing any
    /// pipelined bytes already sitting in the parser's buffer.
    fn finish_write(&mut self, idx: usize) {
        let keep_alive = match self.slab.get(idx) {
            Some(conn) => conn.keep_alive,
            None => return,
        };

        if !keep_alive {
            self.close_conn(idx);
            return;
        }

        let fd = {
            let conn = match self.slab.get_mut(idx) {
                Some(c) => c,
                None => return,
            };
            conn.state = ConnState::Reading;
            conn.write_buffer.clear();
            conn.write_pos = 0;
            conn.fd
        };

        if let Err(e) = self.epoll.modify(fd, idx as u64, EPOLLIN) {
            tracing::warn!(reactor = self.id, error = %e, "failed to switch to read interest");
        }

        self.try_complete_pending(idx);
    }

    /// After a keep-alive reset, bytes belonging to the next pipelined
    /// request may already be sitting in the parser's internal buffer.
    /// Feed it an empty slice to let it complete without waiting on a
    /// fresh readable event that may never arrive if the peer is done
    /// sending for now.
    fn try_complete_pending(&mut self, idx: usize) {
        let complete = match self.slab.get_mut(idx) {
            Some(conn) => conn.parser.feed(&[]),
            None => return,
        };
        if complete {
            self.dispatch(idx);
        }
    }

    fn close_conn(&mut self, idx: usize) {
        if let Some(conn) = self.slab.free(idx) {
            tracing::debug!(reactor = self.id, fd = conn.fd, "connection closed");
            let _ = self.epoll.delete(conn.fd);
            unsafe {
                libc::close(conn.fd);
            }
        }
    }

    /// Closes connections that have sat idle (while Reading, awaiting a
    /// request) past the configured keep-alive timeout. Runs at most once
    /// per second regardless of how often `run`'s loop spins.
    fn sweep_timeouts(&mut self) {
        let now = now_secs();
        if now.saturating_sub(self.last_sweep) < 1 {
            return;
        }
        self.last_sweep = now;

        let stale: Vec<usize> = self
            .slab
            .iter()
            .filter(|(_, conn)| conn.is_idle_past(now, self.keep_alive_timeout_secs))
            .map(|(idx, _)| idx)
            .collect();

        for idx in stale {
            if let Some(conn) = self.slab.get(idx) {
                tracing::info!(reactor = self.id, fd = conn.fd, "connection timed out for client");
            }
            self.close_conn(idx);
        }
    }

    fn shutdown_all(&mut self) {
        let indices: Vec<usize> = self.slab.iter().map(|(idx, _)| idx).collect();
        for idx in indices {
            self.close_conn(idx);
        }
        unsafe {
            libc::close(self.pipe_read_fd);
        }
    }
}

/// `Connection: close` always wins; otherwise HTTP/1.1 defaults to
/// keep-alive and everything older defaults to close.
fn should_keep_alive(request: &crate::http::HttpRequest) -> bool {
    if let Some(conn_header) = request.header("Connection") {
        if conn_header.eq_ignore_ascii_case("close") {
            return false;
        }
        if conn_header.eq_ignore_ascii_case("keep-alive") {
            return true;
        }
    }
    request.version.eq_ignore_ascii_case("HTTP/1.1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, Method};
    use std::collections::HashMap;

    fn req(version: &str, connection: Option<&str>) -> HttpRequest {
        let mut headers = HashMap::new();
        if let Some(c) = connection {
            headers.insert("Connection".to_string(), c.to_string());
        }
        HttpRequest {
            method: Method::Get,
            full_route: "/".to_string(),
            route: "/".to_string(),
            version: version.to_string(),
            headers,
            query_params: HashMap::new(),
            path_params: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn connection_close_wins_regardless_of_version() {
        assert!(!should_keep_alive(&req("HTTP/1.1", Some("close"))));
    }

    #[test]
    fn http_1_1_defaults_to_keep_alive() {
        assert!(should_keep_alive(&req("HTTP/1.1", None)));
    }

    #[test]
    fn http_1_0_defaults_to_close_unless_explicit() {
        assert!(!should_keep_alive(&req("HTTP/1.0", None)));
        assert!(should_keep_alive(&req("HTTP/1.0", Some("keep-alive"))));
    }
}
