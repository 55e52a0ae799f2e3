use malblock_common::UpstreamConfig;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Weighted round-robin over the configured upstream group.
pub struct UpstreamSelector {
    pub name: String,
    addrs: Vec<String>,
    counter: AtomicUsize,
    /// Server indices repeated by weight.
    weighted_indices: Vec<usize>,
}

impl UpstreamSelector {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        let addrs: Vec<String> = config.servers.iter().map(|s| s.addr.clone()).collect();

        // server 0 with weight 3 → [0, 0, 0]
        let mut weighted_indices: Vec<usize> = config
            .servers
            .iter()
            .enumerate()
            .flat_map(|(i, s)| std::iter::repeat(i).take(s.weight as usize))
            .collect();
        if weighted_indices.is_empty() {
            // All weights zero: fall back to equal weight.
            weighted_indices = (0..addrs.len()).collect();
        }

        Self {
            name: config.name.clone(),
            addrs,
            counter: AtomicUsize::new(0),
            weighted_indices,
        }
    }

    pub fn select(&self) -> Option<&str> {
        if self.weighted_indices.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % self.weighted_indices.len();
        self.addrs
            .get(self.weighted_indices[idx])
            .map(String::as_str)
    }

    pub fn server_count(&self) -> usize {
        self.addrs.len()
    }
}
