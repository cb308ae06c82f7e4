//! Straight-line deadhead strategy: a fixed number of forward hops, then
//! land. Consults no sensors; useful for range checks and as the
//! simplest exercise of the strategy seam.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::command::Command;
use crate::config::DeadheadConfig;
use crate::unit::TelloUnit;

use super::{NextTask, SwarmStrategy};

pub struct DeadheadNTimes {
    config: DeadheadConfig,
    counts: Mutex<HashMap<IpAddr, u32>>,
}

impl DeadheadNTimes {
    pub fn new(config: DeadheadConfig) -> Self {
        Self {
            config,
            counts: Mutex::new(HashMap::new()),
        }
    }
}

impl SwarmStrategy for DeadheadNTimes {
    fn next_task(&self, unit: &TelloUnit, _units: &[Arc<TelloUnit>]) -> NextTask {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(unit.addr()).or_insert(0);
        *count += 1;

        if *count <= self.config.hops {
            debug!(unit = %unit.addr(), hop = *count, of = self.config.hops, "deadheading forward");
            (
                true,
                Some(Command::Go {
                    x: self.config.distance_cm as i32,
                    y: 0,
                    z: 0,
                    speed: self.config.speed_cms,
                    pad: None,
                }),
            )
        } else {
            debug!(unit = %unit.addr(), "deadhead complete, landing");
            (false, None)
        }
    }

    fn name(&self) -> &'static str {
        "DeadheadNTimes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lands_after_exactly_n_hops() {
        let strategy = DeadheadNTimes::new(DeadheadConfig {
            hops: 3,
            distance_cm: 100,
            speed_cms: 50,
        });
        let units = vec![Arc::new(TelloUnit::new("192.168.50.51".parse().unwrap()))];

        for _ in 0..3 {
            let (go_on, cmd) = strategy.next_task(&units[0], &units);
            assert!(go_on);
            assert_eq!(
                cmd,
                Some(Command::Go {
                    x: 100,
                    y: 0,
                    z: 0,
                    speed: 50,
                    pad: None,
                })
            );
        }
        assert_eq!(strategy.next_task(&units[0], &units), (false, None));
    }

    #[test]
    fn test_counts_are_per_unit() {
        let strategy = DeadheadNTimes::new(DeadheadConfig {
            hops: 1,
            distance_cm: 100,
            speed_cms: 50,
        });
        let units = vec![
            Arc::new(TelloUnit::new("192.168.50.51".parse().unwrap())),
            Arc::new(TelloUnit::new("192.168.50.52".parse().unwrap())),
        ];

        assert!(strategy.next_task(&units[0], &units).0);
        // The first unit is done, the second still has its hop.
        assert!(!strategy.next_task(&units[0], &units).0);
        assert!(strategy.next_task(&units[1], &units).0);
    }
}
