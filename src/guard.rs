//! Time-of-flight proximity guard: forces a landing when an obstacle is
//! close ahead.
//!
//! One guard loop runs per unit, independent of and higher-priority than
//! the strategy-driven command loop. It never reads strategy state; when
//! it trips it detaches the unit's pending exchange and lands the unit
//! itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::SessionConfig;
use crate::control::ControlChannel;
use crate::errors::{Error, Result};
use crate::unit::TelloUnit;

pub struct ProximityGuard {
    control: Arc<ControlChannel>,
    threshold_mm: u32,
    poll_interval: Duration,
    reply_timeout: Duration,
}

impl ProximityGuard {
    pub fn new(control: Arc<ControlChannel>, config: &SessionConfig) -> Self {
        Self {
            control,
            threshold_mm: config.range_threshold_mm,
            poll_interval: config.range_poll_interval(),
            reply_timeout: config.range_reply_timeout(),
        }
    }

    /// Poll `unit`'s front range until the unit finishes or an obstacle
    /// forces a landing. Returns `true` if the guard landed the unit (the
    /// caller owns the finish accounting).
    ///
    /// # Errors
    /// Propagates transport failures; a missed reply is not one.
    pub(crate) async fn watch(&self, unit: &TelloUnit) -> Result<bool> {
        // A grounded drone faces whatever happens to be in front of it;
        // only an airborne unit gets guarded.
        while !unit.airborne() {
            if unit.finished() {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }

        loop {
            sleep(self.poll_interval).await;
            if unit.finished() {
                return Ok(false);
            }

            let Some(range) = self
                .control
                .range_query(unit.addr(), self.reply_timeout)
                .await?
            else {
                debug!(unit = %unit.addr(), "range poll went unanswered");
                continue;
            };
            unit.record_front_range(range);
            trace!(unit = %unit.addr(), range_mm = range, "front range");

            if range < self.threshold_mm {
                warn!(
                    unit = %unit.addr(),
                    range_mm = range,
                    threshold_mm = self.threshold_mm,
                    "obstacle ahead, forcing landing"
                );
                self.force_landing(unit).await?;
                return Ok(true);
            }
        }
    }

    /// Take the unit away from its normal command loop and land it.
    async fn force_landing(&self, unit: &TelloUnit) -> Result<()> {
        // Order matters: the lifecycle task checks `landing_requested`
        // before binding a new slot, so setting it first bounds the
        // detach race to at most one stale binding.
        unit.mark_landing_requested();
        self.control.detach(unit.addr());
        loop {
            match self.control.exchange(unit.addr(), &Command::Land).await {
                Err(Error::AckSlotBusy(_)) => {
                    self.control.detach(unit.addr());
                }
                Err(e) => return Err(e),
                Ok(_) => return Ok(()),
            }
        }
    }
}
