//! Session and strategy configuration.
//!
//! Every tunable has a serde defaulting function so a partial TOML file
//! (or none at all) yields a flyable setup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport and safety-guard tuning for a swarm session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// UDP port the drones listen for commands on.
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// UDP port the drones broadcast state lines to.
    #[serde(default = "default_telemetry_port")]
    pub telemetry_port: u16,

    /// Local port the control socket binds to.
    #[serde(default = "default_local_port")]
    pub local_port: u16,

    /// Front range below which the proximity guard forces a landing, mm.
    #[serde(default = "default_range_threshold_mm")]
    pub range_threshold_mm: u32,

    /// Pause between proximity polls, milliseconds.
    #[serde(default = "default_range_poll_ms")]
    pub range_poll_ms: u64,

    /// How long to wait for a range reply before re-polling, milliseconds.
    #[serde(default = "default_range_reply_timeout_ms")]
    pub range_reply_timeout_ms: u64,
}

fn default_control_port() -> u16 {
    8889
}

fn default_telemetry_port() -> u16 {
    8890
}

fn default_local_port() -> u16 {
    42345
}

fn default_range_threshold_mm() -> u32 {
    500
}

fn default_range_poll_ms() -> u64 {
    500
}

fn default_range_reply_timeout_ms() -> u64 {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_port: default_control_port(),
            telemetry_port: default_telemetry_port(),
            local_port: default_local_port(),
            range_threshold_mm: default_range_threshold_mm(),
            range_poll_ms: default_range_poll_ms(),
            range_reply_timeout_ms: default_range_reply_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn range_poll_interval(&self) -> Duration {
        Duration::from_millis(self.range_poll_ms)
    }

    pub fn range_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.range_reply_timeout_ms)
    }
}

/// Tuning for [`FollowToEndPad`](crate::FollowToEndPad).
///
/// Pad numbers are sets: any member of `end_pads` terminates the path,
/// anything else visible is treated as a path pad.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FollowConfig {
    /// Pad numbers expected along the path.
    #[serde(default = "default_path_pads")]
    pub path_pads: Vec<u8>,

    /// Pad numbers that end the path; the unit centers and lands on these.
    #[serde(default = "default_end_pads")]
    pub end_pads: Vec<u8>,

    /// Forward hop distance between consecutive pads, cm.
    #[serde(default = "default_pad_distance_cm")]
    pub pad_distance_cm: u32,

    /// Cruise altitude for even-indexed units, cm.
    #[serde(default = "default_flight_level_low_cm")]
    pub flight_level_low_cm: i32,

    /// Cruise altitude for odd-indexed units, cm. Keeping the two levels
    /// apart stops vertically interleaved units colliding on hops.
    #[serde(default = "default_flight_level_high_cm")]
    pub flight_level_high_cm: i32,

    /// Hop speed, cm/s.
    #[serde(default = "default_speed_cms")]
    pub speed_cms: u32,

    /// Altitude the search sweep runs at, cm.
    #[serde(default = "default_search_altitude_cm")]
    pub search_altitude_cm: i32,

    /// Yaw misalignment at or above which a rotation is issued, degrees.
    #[serde(default = "default_yaw_tolerance_deg")]
    pub yaw_tolerance_deg: i32,

    /// Offset box inside which the unit counts as centered, mm.
    #[serde(default = "default_center_tolerance_mm")]
    pub center_tolerance_mm: i32,
}

fn default_path_pads() -> Vec<u8> {
    vec![1]
}

fn default_end_pads() -> Vec<u8> {
    vec![5]
}

fn default_pad_distance_cm() -> u32 {
    380
}

fn default_flight_level_low_cm() -> i32 {
    50
}

fn default_flight_level_high_cm() -> i32 {
    150
}

fn default_speed_cms() -> u32 {
    50
}

fn default_search_altitude_cm() -> i32 {
    100
}

fn default_yaw_tolerance_deg() -> i32 {
    10
}

fn default_center_tolerance_mm() -> i32 {
    10
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            path_pads: default_path_pads(),
            end_pads: default_end_pads(),
            pad_distance_cm: default_pad_distance_cm(),
            flight_level_low_cm: default_flight_level_low_cm(),
            flight_level_high_cm: default_flight_level_high_cm(),
            speed_cms: default_speed_cms(),
            search_altitude_cm: default_search_altitude_cm(),
            yaw_tolerance_deg: default_yaw_tolerance_deg(),
            center_tolerance_mm: default_center_tolerance_mm(),
        }
    }
}

/// Tuning for [`DeadheadNTimes`](crate::DeadheadNTimes).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeadheadConfig {
    /// Number of straight hops before landing.
    #[serde(default = "default_hops")]
    pub hops: u32,

    /// Hop distance, cm.
    #[serde(default = "default_hop_distance_cm")]
    pub distance_cm: u32,

    /// Hop speed, cm/s.
    #[serde(default = "default_speed_cms")]
    pub speed_cms: u32,
}

fn default_hops() -> u32 {
    3
}

fn default_hop_distance_cm() -> u32 {
    100
}

impl Default for DeadheadConfig {
    fn default() -> Self {
        Self {
            hops: default_hops(),
            distance_cm: default_hop_distance_cm(),
            speed_cms: default_speed_cms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config.control_port, 8889);
        assert_eq!(config.telemetry_port, 8890);
        assert_eq!(config.range_threshold_mm, 500);
    }

    #[test]
    fn test_partial_follow_config() {
        let config: FollowConfig = toml::from_str(
            r#"
            path_pads = [1, 2, 3]
            end_pads = [8]
            pad_distance_cm = 150
            "#,
        )
        .unwrap();
        assert_eq!(config.path_pads, vec![1, 2, 3]);
        assert_eq!(config.end_pads, vec![8]);
        assert_eq!(config.pad_distance_cm, 150);
        assert_eq!(config.yaw_tolerance_deg, 10);
        assert_eq!(config.center_tolerance_mm, 10);
    }
}
