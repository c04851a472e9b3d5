use std::time::Duration;

use restlock_core::Event;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{CliResult, Context};

/// Run the alarm poller on a single-threaded runtime until Ctrl-C.
///
/// Each delivered outcome is printed as one JSON line.
pub fn run(poll_ms: Option<u64>) -> CliResult {
    let ctx = Context::open()?;
    let poll = poll_ms.unwrap_or(ctx.config.daemon.poll_interval_ms).max(1);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(&ctx, Duration::from_millis(poll)))
}

async fn serve(ctx: &Context, poll: Duration) -> CliResult {
    let startup = ctx.serialized(|engine| engine.dispatch(Event::Startup))?;
    println!("{}", serde_json::to_string(&startup)?);
    info!(poll_ms = poll.as_millis() as u64, "daemon started");

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(()).await;
    });

    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ctx.serialized(|engine| engine.deliver_due()) {
                    Ok(outcomes) => {
                        for outcome in outcomes {
                            println!("{}", serde_json::to_string(&outcome)?);
                        }
                    }
                    // Unacknowledged alarms stay armed and are retried.
                    Err(e) if e.is_retryable() => warn!(error = %e, "alarm delivery failed"),
                    Err(e) => return Err(e.into()),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}
