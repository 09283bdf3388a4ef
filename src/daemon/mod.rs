use anyhow::Result;
use log::{error, info};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::pipeline::Pipeline;

pub struct DaemonConfig {
    pub interval_secs: u64,
}

/// Run passes back to back, `interval_secs` apart, until Ctrl-C.
pub fn run_daemon(pipeline: &Pipeline<'_>, cfg: DaemonConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        match pipeline.run_once() {
            Ok(report) => info!("pass finished: {report}"),
            Err(e) => error!("pass aborted: {e}"),
        }
        sleep_unless_stopped(&running, Duration::from_secs(cfg.interval_secs));
    }

    info!("stopping");
    Ok(())
}

fn sleep_unless_stopped(running: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(250);
    let mut slept = Duration::ZERO;
    while slept < total && running.load(Ordering::SeqCst) {
        thread::sleep(step);
        slept += step;
    }
}
