//! Bounded-area perimeter search for a lost mission pad.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use crate::command::Command;
use crate::unit::TelloUnit;

/// Six-step sweep around the perimeter of the spot where the pad was
/// lost. A full cycle returns the unit close to its starting point.
const SWEEP: [Command; 6] = [
    Command::Left(50),
    Command::Forward(20),
    Command::Right(50),
    Command::Right(50),
    Command::Forward(20),
    Command::Left(50),
];

/// Speed of the initial altitude seek, cm/s.
const SEEK_SPEED: u32 = 10;

/// Cycle value for a unit that has been issued the seek but no sweep
/// step yet.
const SEEK_ISSUED: i32 = -1;

/// Per-unit search state. The first call after a pad is lost climbs (or
/// descends) to the search altitude; later calls walk the sweep, cycling
/// modulo its length until the pad is reacquired.
#[derive(Debug, Default)]
pub struct FindPadTask {
    cycles: Mutex<HashMap<IpAddr, i32>>,
}

impl FindPadTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next search movement for `unit`.
    ///
    /// The altitude seek is a relative `go`, so the climb is the search
    /// altitude minus the unit's current height.
    pub fn execute(&self, unit: &TelloUnit, search_altitude_cm: i32) -> Command {
        let mut cycles = self.cycles.lock().unwrap();
        match cycles.get_mut(&unit.addr()) {
            None => {
                cycles.insert(unit.addr(), SEEK_ISSUED);
                let climb = search_altitude_cm - unit.sensed().height_mm / 10;
                Command::Go {
                    x: 0,
                    y: 0,
                    z: climb,
                    speed: SEEK_SPEED,
                    pad: None,
                }
            }
            Some(cycle) => {
                *cycle += 1;
                SWEEP[*cycle as usize % SWEEP.len()].clone()
            }
        }
    }

    /// Forget the search cycle for `unit`; its next loss starts with a
    /// fresh altitude seek.
    pub fn reset(&self, unit: &TelloUnit) {
        self.cycles.lock().unwrap().remove(&unit.addr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> TelloUnit {
        TelloUnit::new("192.168.50.51".parse().unwrap())
    }

    #[test]
    fn test_first_call_seeks_search_altitude() {
        let task = FindPadTask::new();
        let u = unit();
        assert_eq!(
            task.execute(&u, 100),
            Command::Go {
                x: 0,
                y: 0,
                z: 100,
                speed: 10,
                pad: None,
            }
        );
    }

    #[test]
    fn test_sweep_follows_seek_and_repeats() {
        let task = FindPadTask::new();
        let u = unit();
        task.execute(&u, 100);

        let mut sweep = Vec::new();
        for _ in 0..13 {
            sweep.push(task.execute(&u, 100));
        }
        let expected = [
            Command::Left(50),
            Command::Forward(20),
            Command::Right(50),
            Command::Right(50),
            Command::Forward(20),
            Command::Left(50),
        ];
        for (n, cmd) in sweep.iter().enumerate() {
            assert_eq!(*cmd, expected[n % 6], "sweep step {n}");
        }
    }

    #[test]
    fn test_reset_restarts_with_seek() {
        let task = FindPadTask::new();
        let u = unit();
        task.execute(&u, 100);
        task.execute(&u, 100);
        task.reset(&u);
        assert_eq!(
            task.execute(&u, 100),
            Command::Go {
                x: 0,
                y: 0,
                z: 100,
                speed: 10,
                pad: None,
            }
        );
    }

    #[test]
    fn test_units_search_independently() {
        let task = FindPadTask::new();
        let a = unit();
        let b = TelloUnit::new("192.168.50.52".parse().unwrap());
        task.execute(&a, 100);
        task.execute(&a, 100);
        // b has not searched yet, so it starts with its own seek.
        assert_eq!(
            task.execute(&b, 100),
            Command::Go {
                x: 0,
                y: 0,
                z: 100,
                speed: 10,
                pad: None,
            }
        );
        assert_eq!(task.execute(&a, 100), Command::Forward(20));
    }
}
