//! Follow a path of mission pads and land on a terminal pad.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::FollowConfig;
use crate::unit::TelloUnit;

use super::{FindPadTask, NextTask, SwarmStrategy};

/// Hop from pad to pad, yaw-aligning on each one, until a pad from the
/// end set comes into view; then nudge onto its center and land.
///
/// Altitude alternates between the two configured flight levels by the
/// unit's index parity, so interleaved units never share a level.
pub struct FollowToEndPad {
    config: FollowConfig,
    pad_finder: FindPadTask,
}

impl FollowToEndPad {
    pub fn new(config: FollowConfig) -> Self {
        Self {
            config,
            pad_finder: FindPadTask::new(),
        }
    }

    fn flight_level(&self, unit: &TelloUnit, units: &[Arc<TelloUnit>]) -> i32 {
        let index = units
            .iter()
            .position(|u| u.addr() == unit.addr())
            .unwrap_or(0);
        if index % 2 == 0 {
            self.config.flight_level_low_cm
        } else {
            self.config.flight_level_high_cm
        }
    }
}

impl SwarmStrategy for FollowToEndPad {
    fn next_task(&self, unit: &TelloUnit, units: &[Arc<TelloUnit>]) -> NextTask {
        let sensed = unit.sensed();
        let altitude = self.flight_level(unit, units);

        let Some(pad) = sensed.detected_pad else {
            debug!(unit = %unit.addr(), "no pad visible, searching");
            return (
                true,
                Some(self.pad_finder.execute(unit, self.config.search_altitude_cm)),
            );
        };

        if !self.config.end_pads.contains(&pad) {
            // A path pad. A sighting without pose data means the decode
            // and the camera disagree; land rather than fly blind.
            let (Some(yaw), Some(_)) = (sensed.pad_yaw, sensed.pad_offset) else {
                warn!(unit = %unit.addr(), pad, "pad visible but pose data missing, landing");
                return (false, None);
            };

            self.pad_finder.reset(unit);

            if yaw.abs() >= self.config.yaw_tolerance_deg {
                debug!(unit = %unit.addr(), pad, yaw, "aligning yaw to path pad");
                let cmd = if yaw > 0 {
                    Command::RotateCw(yaw.unsigned_abs())
                } else {
                    Command::RotateCcw(yaw.unsigned_abs())
                };
                return (true, Some(cmd));
            }

            if !self.config.path_pads.contains(&pad) {
                warn!(unit = %unit.addr(), pad, "pad is neither a path nor an end pad, following it anyway");
            }
            debug!(unit = %unit.addr(), pad, altitude, "hopping to the next pad");
            (
                true,
                Some(Command::Go {
                    x: self.config.pad_distance_cm as i32,
                    y: 0,
                    z: altitude,
                    speed: self.config.speed_cms,
                    pad: Some(pad),
                }),
            )
        } else {
            let Some((x, y)) = sensed.pad_offset else {
                warn!(unit = %unit.addr(), pad, "end pad visible but offset missing, landing");
                return (false, None);
            };

            let tolerance = self.config.center_tolerance_mm;
            if x.abs() <= tolerance && y.abs() <= tolerance {
                info!(unit = %unit.addr(), pad, x, y, "centered over the end pad, landing");
                (false, None)
            } else {
                debug!(unit = %unit.addr(), pad, x, y, "centering over the end pad");
                (
                    true,
                    Some(Command::Go {
                        x: 0,
                        y: 0,
                        z: altitude,
                        speed: self.config.speed_cms,
                        pad: Some(pad),
                    }),
                )
            }
        }
    }

    fn name(&self) -> &'static str {
        "FollowToEndPad"
    }
}
