//! Swarm strategies: map observed unit state to the next command.

mod deadhead;
mod find_pad;
mod follow_to_end;

pub use deadhead::DeadheadNTimes;
pub use find_pad::FindPadTask;
pub use follow_to_end::FollowToEndPad;

use std::sync::Arc;

use crate::command::Command;
use crate::unit::TelloUnit;

/// A strategy decision: whether the unit keeps flying, and if so the
/// command it flies next. `(true, None)` is a contract violation the
/// session treats as fatal; `(false, _)` lands the unit.
pub type NextTask = (bool, Option<Command>);

/// Trait for swarm strategies.
///
/// Called once per acknowledged command while a unit is navigating. The
/// decision is a function of the unit's sensed state and its position in
/// the swarm's ordered unit list; strategies must not block.
pub trait SwarmStrategy: Send + Sync {
    /// Decide the next task for `unit`. `units` is the session's full
    /// ordered list; a unit's index in it is stable for the whole run.
    fn next_task(&self, unit: &TelloUnit, units: &[Arc<TelloUnit>]) -> NextTask;

    /// Name of this strategy for logging.
    fn name(&self) -> &'static str;
}

/// Blanket implementation for boxed strategies.
impl SwarmStrategy for Box<dyn SwarmStrategy> {
    fn next_task(&self, unit: &TelloUnit, units: &[Arc<TelloUnit>]) -> NextTask {
        (**self).next_task(unit, units)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
