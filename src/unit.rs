//! Per-drone state shared between the channels, the guard and the
//! strategies.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::telemetry::TelemetryFrame;

/// Snapshot of what a unit currently senses.
///
/// `detected_pad = None` implies `pad_offset` and `pad_yaw` are `None`
/// too; the telemetry decode clears the three together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensedState {
    /// Mission pad id the downward camera currently sees.
    pub detected_pad: Option<u8>,
    /// Offset from the pad center, millimeters.
    pub pad_offset: Option<(i32, i32)>,
    /// Yaw relative to the pad orientation, degrees.
    pub pad_yaw: Option<i32>,
    /// Height above the floor, millimeters.
    pub height_mm: i32,
    /// Last front time-of-flight reading, millimeters.
    pub front_range_mm: Option<u32>,
}

/// One drone in the swarm.
///
/// Lifecycle flags are monotonic: once set they are never cleared, which
/// is what lets the guard and the lifecycle task race on them safely.
/// Sensed state sits behind a single mutex so a telemetry update is
/// atomic with respect to a strategy read.
#[derive(Debug)]
pub struct TelloUnit {
    addr: IpAddr,
    commanded: AtomicBool,
    airborne: AtomicBool,
    labelled: AtomicBool,
    landing_requested: AtomicBool,
    finished: AtomicBool,
    sensed: Mutex<SensedState>,
}

impl TelloUnit {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            commanded: AtomicBool::new(false),
            airborne: AtomicBool::new(false),
            labelled: AtomicBool::new(false),
            landing_requested: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            sensed: Mutex::new(SensedState::default()),
        }
    }

    /// Network identity; also the key for ack and range-poll slots.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Copy of the current sensed state.
    pub fn sensed(&self) -> SensedState {
        *self.sensed.lock().unwrap()
    }

    pub fn commanded(&self) -> bool {
        self.commanded.load(Ordering::Acquire)
    }

    pub fn airborne(&self) -> bool {
        self.airborne.load(Ordering::Acquire)
    }

    pub fn labelled(&self) -> bool {
        self.labelled.load(Ordering::Acquire)
    }

    pub fn landing_requested(&self) -> bool {
        self.landing_requested.load(Ordering::Acquire)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_commanded(&self) {
        self.commanded.store(true, Ordering::Release);
    }

    pub(crate) fn mark_airborne(&self) {
        self.airborne.store(true, Ordering::Release);
    }

    pub(crate) fn mark_labelled(&self) {
        self.labelled.store(true, Ordering::Release);
    }

    pub(crate) fn mark_landing_requested(&self) {
        self.landing_requested.store(true, Ordering::Release);
    }

    /// Set the `finished` flag. Returns `true` only for the caller that
    /// actually flipped it, so finish accounting runs exactly once per
    /// unit no matter who lands it.
    pub(crate) fn mark_finished(&self) -> bool {
        !self.finished.swap(true, Ordering::AcqRel)
    }

    /// Apply one decoded telemetry frame. Pad id, offset and yaw change
    /// together under the lock; height is always updated.
    pub(crate) fn apply_telemetry(&self, frame: &TelemetryFrame) {
        let mut sensed = self.sensed.lock().unwrap();
        match frame.pad {
            Some(pad) => {
                sensed.detected_pad = Some(pad.id);
                sensed.pad_offset = Some(pad.offset);
                sensed.pad_yaw = Some(pad.yaw);
            }
            None => {
                sensed.detected_pad = None;
                sensed.pad_offset = None;
                sensed.pad_yaw = None;
            }
        }
        sensed.height_mm = frame.height_mm;
    }

    /// Record a front range reading from the proximity guard.
    pub(crate) fn record_front_range(&self, mm: u32) {
        self.sensed.lock().unwrap().front_range_mm = Some(mm);
    }

    /// Overwrite the sensed state wholesale, bypassing the telemetry
    /// decode's consistency guarantees. Test-only.
    #[cfg(test)]
    pub(crate) fn set_sensed(&self, sensed: SensedState) {
        *self.sensed.lock().unwrap() = sensed;
    }
}
