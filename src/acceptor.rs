use crate::syscalls;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns the single listen socket and hands each accepted connection to a
/// reactor thread in round-robin order over that reactor's handoff pipe.
/// Runs on the thread that called `Server::serve`, unblocked from its
/// blocking `accept()` by `shutdown_read` when the process is asked to
/// stop.
pub struct Acceptor {
    listen_fd: i32,
    pipe_write_fds: Vec<i32>,
    next: usize,
}

impl Acceptor {
    pub fn new(listen_fd: i32, pipe_write_fds: Vec<i32>) -> Self {
        Self {
            listen_fd,
            pipe_write_fds,
            next: 0,
        }
    }

    pub fn run(&mut self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            match syscalls::accept_blocking(self.listen_fd) {
                Ok(fd) => self.dispatch(fd),
                Err(e) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    // Transient accept errors (e.g. ECONNABORTED) must not
                    // stop the acceptor from servicing later connections.
                    tracing::warn!(error = %e, "accept failed, continuing");
                    continue;
                }
            }
        }
        unsafe {
            libc::close(self.listen_fd);
        }
    }

    fn dispatch(&mut self, client_fd: i32) {
        let target = self.pipe_write_fds[self.next];
        self.next = (self.next + 1) % self.pipe_write_fds.len();
        if let Err(e) = syscalls::send_fd_over_pipe(target, client_fd) {
            tracing::error!(error = %e, "failed to hand off connection to reactor");
            unsafe {
                libc::close(client_fd);
            }
        }
    }
}
