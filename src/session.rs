//! Swarm session: owns the units, drives each lifecycle, detects
//! completion.
//!
//! Each unit gets its own lifecycle task that sends one command and
//! waits for its ack per step. All mutation of sensed state happens on
//! socket-receive paths; the completion signal fires exactly once, on
//! the first fatal error or when the last unit finishes.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::SessionConfig;
use crate::control::{Ack, AckOutcome, ControlChannel};
use crate::errors::{Error, Result};
use crate::guard::ProximityGuard;
use crate::strategy::SwarmStrategy;
use crate::telemetry::TelemetryChannel;
use crate::unit::TelloUnit;

/// A complete swarm run: both channels, one lifecycle and one guard task
/// per unit, and the completion signal the caller awaits.
pub struct SwarmSession {
    inner: Arc<SessionInner>,
    telemetry: Option<TelemetryChannel>,
    completion_rx: oneshot::Receiver<Result<()>>,
}

struct SessionInner {
    units: Vec<Arc<TelloUnit>>,
    control: Arc<ControlChannel>,
    strategy: Arc<dyn SwarmStrategy>,
    config: SessionConfig,
    unfinished: AtomicUsize,
    completion: Mutex<Option<oneshot::Sender<Result<()>>>>,
}

impl SwarmSession {
    /// Bind both sockets and prepare one unit per address. The address
    /// order is load-bearing: it defines each unit's index, which picks
    /// its altitude band and its label.
    pub async fn new(
        addrs: Vec<IpAddr>,
        strategy: Arc<dyn SwarmStrategy>,
        config: SessionConfig,
    ) -> Result<Self> {
        if addrs.is_empty() {
            return Err(Error::config("swarm needs at least one drone address"));
        }
        let units: Vec<Arc<TelloUnit>> = addrs
            .into_iter()
            .map(|addr| Arc::new(TelloUnit::new(addr)))
            .collect();

        let control =
            Arc::new(ControlChannel::bind(config.local_port, config.control_port).await?);
        let telemetry = TelemetryChannel::bind(config.telemetry_port, &units).await?;

        let (completion_tx, completion_rx) = oneshot::channel();
        let unfinished = AtomicUsize::new(units.len());

        Ok(Self {
            inner: Arc::new(SessionInner {
                units,
                control,
                strategy,
                config,
                unfinished,
                completion: Mutex::new(Some(completion_tx)),
            }),
            telemetry: Some(telemetry),
            completion_rx,
        })
    }

    /// The session's units, in address order.
    pub fn units(&self) -> &[Arc<TelloUnit>] {
        &self.inner.units
    }

    /// Fly the swarm to completion.
    ///
    /// Resolves when every unit has finished (success) or on the first
    /// fatal error; either way all channel, lifecycle and guard tasks
    /// are torn down before returning.
    pub async fn run(mut self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        info!(
            strategy = inner.strategy.name(),
            units = inner.units.len(),
            "starting swarm session"
        );

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let known: HashSet<IpAddr> = inner.units.iter().map(|u| u.addr()).collect();
        let control_reader = {
            let inner = Arc::clone(&inner);
            let control = Arc::clone(&inner.control);
            tokio::spawn(async move {
                let err = control.run_reader(known).await;
                inner.fail(err);
            })
        };
        tasks.push(control_reader);

        let telemetry = self
            .telemetry
            .take()
            .ok_or(Error::SessionAborted)?;
        let telemetry_reader = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let err = telemetry.run().await;
                inner.fail(err);
            })
        };
        tasks.push(telemetry_reader);

        let guard = Arc::new(ProximityGuard::new(
            Arc::clone(&inner.control),
            &inner.config,
        ));
        for (index, unit) in inner.units.iter().enumerate() {
            let lifecycle = {
                let inner = Arc::clone(&inner);
                let unit = Arc::clone(unit);
                tokio::spawn(async move { run_unit(inner, unit, unit_label(index)).await })
            };
            tasks.push(lifecycle);

            let watch = {
                let inner = Arc::clone(&inner);
                let guard = Arc::clone(&guard);
                let unit = Arc::clone(unit);
                tokio::spawn(async move {
                    match guard.watch(&unit).await {
                        Ok(true) => inner.finish_unit(&unit),
                        Ok(false) => {}
                        Err(err) => inner.fail(err),
                    }
                })
            };
            tasks.push(watch);
        }

        let result = match (&mut self.completion_rx).await {
            Ok(result) => result,
            Err(_) => Err(Error::SessionAborted),
        };
        for task in &tasks {
            task.abort();
        }
        result
    }
}

impl SessionInner {
    /// Fulfil the completion signal with a fatal error. First caller
    /// wins; later failures are logged and dropped.
    fn fail(&self, err: Error) {
        match self.completion.lock().unwrap().take() {
            Some(tx) => {
                error!("session failed: {err}");
                let _ = tx.send(Err(err));
            }
            None => debug!("ignoring error after completion: {err}"),
        }
    }

    /// Count a unit as finished, exactly once, and fire the completion
    /// signal when it was the last one.
    fn finish_unit(&self, unit: &TelloUnit) {
        if !unit.mark_finished() {
            return;
        }
        let remaining = self.unfinished.fetch_sub(1, Ordering::AcqRel) - 1;
        info!(unit = %unit.addr(), remaining, "unit finished");
        if remaining == 0 {
            if let Some(tx) = self.completion.lock().unwrap().take() {
                info!("all units finished, closing the session");
                let _ = tx.send(Ok(()));
            }
        }
    }
}

/// Matrix label for the unit at `index`: 'a', 'b', …
fn unit_label(index: usize) -> char {
    (b'a' + (index % 26) as u8) as char
}

/// How a lifecycle ended, short of a fatal error.
enum Drive {
    /// The unit reached `finished` (landed, or was excluded on an error
    /// ack) under this task's control.
    Finished,
    /// The ack slot was detached: the proximity guard owns the unit now
    /// and does its finish accounting.
    Detached,
}

async fn run_unit(inner: Arc<SessionInner>, unit: Arc<TelloUnit>, label: char) {
    match drive_unit(&inner, &unit, label).await {
        Ok(Drive::Finished) => inner.finish_unit(&unit),
        Ok(Drive::Detached) => {
            debug!(unit = %unit.addr(), "lifecycle detached, guard owns the unit")
        }
        Err(err) => inner.fail(err),
    }
}

/// Walk one unit through its lifecycle: SDK mode, takeoff, label, then
/// the strategy-driven navigation loop, then landing.
async fn drive_unit(
    inner: &Arc<SessionInner>,
    unit: &Arc<TelloUnit>,
    label: char,
) -> Result<Drive> {
    let Some(ack) = step(inner, unit, &Command::SdkMode).await? else {
        return Ok(Drive::Detached);
    };
    if ack.is_error() {
        warn!(unit = %unit.addr(), "unit rejected SDK mode, excluding it");
        return Ok(Drive::Finished);
    }
    unit.mark_commanded();

    let Some(ack) = step(inner, unit, &Command::Takeoff).await? else {
        return Ok(Drive::Detached);
    };
    if ack.is_error() {
        warn!(unit = %unit.addr(), "takeoff failed, excluding unit");
        return Ok(Drive::Finished);
    }
    unit.mark_airborne();

    let Some(ack) = step(inner, unit, &Command::MatrixLabel(label)).await? else {
        return Ok(Drive::Detached);
    };
    if ack.is_error() {
        warn!(unit = %unit.addr(), label = %label, "labelling failed, excluding unit");
        return Ok(Drive::Finished);
    }
    unit.mark_labelled();

    loop {
        // The guard may have taken the unit over between acks.
        if unit.landing_requested() || unit.finished() {
            return Ok(Drive::Detached);
        }

        let (proceed, command) = inner.strategy.next_task(unit, &inner.units);
        if !proceed {
            break;
        }
        let command = command.ok_or(Error::StrategyContract(inner.strategy.name()))?;

        let Some(ack) = step(inner, unit, &command).await? else {
            return Ok(Drive::Detached);
        };
        if ack.is_error() {
            warn!(unit = %unit.addr(), "unit reported an error, excluding it from the swarm");
            return Ok(Drive::Finished);
        }
    }

    unit.mark_landing_requested();
    info!(unit = %unit.addr(), "strategy complete, landing");
    let Some(ack) = step(inner, unit, &Command::Land).await? else {
        return Ok(Drive::Detached);
    };
    if ack.is_error() {
        warn!(unit = %unit.addr(), "landing reported an error");
    }
    Ok(Drive::Finished)
}

/// Send one command and wait for its ack. `None` means the slot was
/// detached mid-exchange.
async fn step(
    inner: &SessionInner,
    unit: &TelloUnit,
    command: &Command,
) -> Result<Option<Ack>> {
    debug!(unit = %unit.addr(), command = %command, "issuing command");
    match inner.control.exchange(unit.addr(), command).await {
        Ok(AckOutcome::Acked(ack)) => Ok(Some(ack)),
        Ok(AckOutcome::Detached) => Ok(None),
        // The guard can bind its own `land` between our landing check and
        // this exchange; that is a takeover, not a protocol bug.
        Err(Error::AckSlotBusy(_)) if unit.landing_requested() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_labels_follow_swarm_order() {
        assert_eq!(unit_label(0), 'a');
        assert_eq!(unit_label(1), 'b');
        assert_eq!(unit_label(4), 'e');
    }
}
