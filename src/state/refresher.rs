use crate::query::QueryClient;
use log::debug;
use std::time::Duration;
use tokio::time::interval;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic cache maintenance: evicts entries nobody has observed for longer
/// than their GC window.
pub struct GarbageCollector {
    client: QueryClient,
    every: Duration,
}

impl GarbageCollector {
    pub fn new(client: QueryClient) -> Self {
        Self { client, every: SWEEP_INTERVAL }
    }

    pub async fn run(self) {
        let mut sweep_interval = interval(self.every);
        // Skip the immediate first tick; nothing can be expired at startup.
        sweep_interval.tick().await;

        loop {
            sweep_interval.tick().await;
            let removed = self.client.collect_garbage();
            if removed > 0 {
                debug!("gc removed {removed} queries");
            }
        }
    }
}
