use serde::Deserialize;

/// Server configuration. Deserializable so deployments can load it from a
/// file or environment layer instead of hardcoding `Server::bind` calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub number_threads: usize,
    pub keep_alive_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            number_threads: num_cpus::get(),
            keep_alive_timeout_secs: 30,
        }
    }
}
