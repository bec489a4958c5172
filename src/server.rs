// src/server.rs
use crate::acceptor::Acceptor;
use crate::config::Config;
use crate::error::{HttpdError, HttpdResult};
use crate::reactor::Reactor;
use crate::router::Router;
use crate::syscalls;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Builds and runs the server: one blocking acceptor thread feeding N
/// reactor threads over per-reactor handoff pipes. `threads` defaults to
/// the number of logical CPUs, matching the one-reactor-per-core layout
/// the corresponding worker-per-core design scaled to.
pub struct Server {
    host: String,
    port: u16,
    threads: usize,
    keep_alive_timeout_secs: u64,
}

impl Server {
    pub fn bind(host_port: &str) -> Self {
        let Parts { host, port } = parse_host_port(host_port).unwrap_or(Parts {
            host: "0.0.0.0".to_string(),
            port: 8080,
        });
        Self {
            host,
            port,
            threads: num_cpus::get(),
            keep_alive_timeout_secs: 30,
        }
    }

    /// Builds a `Server` from a `Config`, the way a host program that loads
    /// its settings from a file or environment would.
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            threads: config.number_threads.max(1),
            keep_alive_timeout_secs: config.keep_alive_timeout_secs,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn keep_alive_timeout(mut self, secs: u64) -> Self {
        self.keep_alive_timeout_secs = secs;
        self
    }

    pub fn serve(self, router: Router) -> HttpdResult<()> {
        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        let router = Arc::new(router);
        let running = Arc::new(AtomicBool::new(true));

        let listen_fd = syscalls::create_listen_socket(&self.host, self.port)?;

        let mut reactors = Vec::with_capacity(self.threads);
        let mut pipe_write_fds = Vec::with_capacity(self.threads);
        for _ in 0..self.threads {
            let (read_fd, write_fd) = syscalls::create_pipe()?;
            pipe_write_fds.push(write_fd);
            reactors.push(read_fd);
        }

        tracing::info!(host = %self.host, port = self.port, threads = self.threads, "starting server");

        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(self.threads);
        for (i, pipe_read_fd) in reactors.into_iter().enumerate() {
            let core_id = core_ids.get(i % core_ids.len().max(1)).copied();
            let router_clone = router.clone();
            let running_clone = running.clone();
            let keep_alive_timeout_secs = self.keep_alive_timeout_secs;

            let handle = thread::Builder::new()
                .name(format!("vireo-reactor-{}", i))
                .spawn(move || {
                    if let Some(id) = core_id {
                        core_affinity::set_for_current(id);
                    }
                    match Reactor::new(i, router_clone, pipe_read_fd, keep_alive_timeout_secs) {
                        Ok(mut reactor) => reactor.run(running_clone),
                        Err(e) => tracing::error!(reactor = i, error = %e, "failed to start"),
                    }
                })
                .map_err(HttpdError::from)?;

            handles.push(handle);
        }

        let shutdown_running = running.clone();
        let shutdown_listen_fd = listen_fd;
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received");
            shutdown_running.store(false, Ordering::Release);
            let _ = syscalls::shutdown_read(shutdown_listen_fd);
        })
        .map_err(|e| HttpdError::Other(e.to_string()))?;

        let mut acceptor = Acceptor::new(listen_fd, pipe_write_fds);
        acceptor.run(running);

        for handle in handles {
            let _ = handle.join();
        }

        Ok(())
    }
}

struct Parts {
    host: String,
    port: u16,
}

fn parse_host_port(hp: &str) -> HttpdResult<Parts> {
    let (host, port) = hp
        .rsplit_once(':')
        .ok_or_else(|| HttpdError::Other("missing port in address".to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| HttpdError::Other("invalid port number".to_string()))?;
    Ok(Parts {
        host: host.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_carries_over_every_field() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9090,
            number_threads: 4,
            keep_alive_timeout_secs: 15,
        };
        let server = Server::from_config(&config);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9090);
        assert_eq!(server.threads, 4);
        assert_eq!(server.keep_alive_timeout_secs, 15);
    }

    #[test]
    fn from_config_floors_zero_threads_to_one() {
        let config = Config {
            number_threads: 0,
            ..Config::default()
        };
        assert_eq!(Server::from_config(&config).threads, 1);
    }
}
