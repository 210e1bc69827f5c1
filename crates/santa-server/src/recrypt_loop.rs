use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use santa_draw::{RecryptJob, RecryptOptions};

/// Background task that keeps stored receiver ciphers on the current key.
///
/// Each tick runs one full recrypt pass on the blocking pool. A failed pass
/// is logged and retried on the next tick.
pub async fn run_recrypt_loop(job: Arc<RecryptJob>, interval_secs: u64, chunk_size: usize) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    let opts = RecryptOptions {
        chunk_size,
        ..Default::default()
    };

    loop {
        interval.tick().await;

        let job = job.clone();
        let opts = opts.clone();
        match tokio::task::spawn_blocking(move || job.run(&opts)).await {
            Ok(Ok(report)) => {
                if report.updated > 0 || report.has_failures() {
                    info!(
                        updated = report.updated,
                        failed = report.failed,
                        "Recrypt: rewrote {} ciphers",
                        report.updated
                    );
                }
            }
            Ok(Err(e)) => warn!("Recrypt error: {:#}", e),
            Err(e) => warn!("Recrypt task panicked: {}", e),
        }
    }
}
