use anyhow::Result;
use std::{future::Future, time::Duration};

use super::{
    core::{SlaveEngine, TransportClosed},
    traits::{Clock, Transport},
};

/// Pause after a failed tick before polling the transport again.
const ERROR_RECOVERY_DELAY: Duration = Duration::from_secs(1);

/// Drive a slave engine from a tokio task until `shutdown` resolves.
///
/// The engine is started, then ticked every `tick_interval`. Transport
/// failures are logged and retried after a pause; a closed event channel
/// ends the loop with an error since nothing will ever arrive again.
pub async fn run_slave_loop<T, C, F>(
    engine: &mut SlaveEngine<T, C>,
    tick_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    T: Transport,
    C: Clock,
    F: Future<Output = ()>,
{
    engine.start()?;

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Shutdown requested, stopping slave loop");
                break;
            }
            _ = interval.tick() => {
                if let Err(err) = engine.tick() {
                    if err.is::<TransportClosed>() {
                        return Err(err);
                    }
                    log::warn!("Error processing request: {err:#}");
                    tokio::time::sleep(ERROR_RECOVERY_DELAY).await;
                }
            }
        }
    }

    Ok(())
}
