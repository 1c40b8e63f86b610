use std::fmt;

use serde::Deserialize;
use smallvec::SmallVec;

/// Point in a loop turn at which a task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleTiming {
	/// At the start of the next turn.
	#[default]
	NextLoopBegan,
	/// At the end of the turn, after every began task.
	CurrentLoopEnded,
	/// After the ended phase, once the turn has no other work left.
	Idle,
}

impl ScheduleTiming {
	/// Phases in the order a turn visits them.
	pub(crate) const PHASES: [ScheduleTiming; 3] = [
		ScheduleTiming::NextLoopBegan,
		ScheduleTiming::CurrentLoopEnded,
		ScheduleTiming::Idle,
	];
}

/// Mode a loop turns in; tasks only fire in modes they were scheduled for.
#[derive(Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLoopMode {
	/// The mode loops turn in unless told otherwise.
	#[default]
	Default,
	/// Matches every mode, both when scheduling and when turning.
	Common,
	/// An application-defined mode.
	Named(Box<str>),
}

impl RunLoopMode {
	/// Creates an application-defined mode.
	pub fn named(name: impl AsRef<str>) -> Self {
		Self::Named(Box::from(name.as_ref()))
	}
}

impl fmt::Debug for RunLoopMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Default => f.write_str("Default"),
			Self::Common => f.write_str("Common"),
			Self::Named(name) => write!(f, "Named({name})"),
		}
	}
}

pub(crate) type TaskFn = Box<dyn FnOnce() + 'static>;

pub(crate) struct Task {
	pub(crate) modes: SmallVec<[RunLoopMode; 2]>,
	pub(crate) timing: ScheduleTiming,
	pub(crate) run: TaskFn,
}

impl Task {
	/// Returns true if the task may fire while the loop turns in `mode`.
	pub(crate) fn fires_in(&self, mode: &RunLoopMode) -> bool {
		*mode == RunLoopMode::Common
			|| self
				.modes
				.iter()
				.any(|m| *m == RunLoopMode::Common || m == mode)
	}
}
