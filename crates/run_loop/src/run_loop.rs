use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use smallvec::smallvec;

use crate::task::{RunLoopMode, ScheduleTiming, Task};

thread_local! {
	static CURRENT: Rc<RunLoop> = Rc::new(RunLoop::new());
}

/// Counts of tasks executed by one loop turn, per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnReport {
	pub began: usize,
	pub ended: usize,
	pub idle: usize,
}

impl TurnReport {
	/// Total tasks executed during the turn.
	pub const fn executed(&self) -> usize {
		self.began + self.ended + self.idle
	}

	fn record(&mut self, timing: ScheduleTiming, count: usize) {
		match timing {
			ScheduleTiming::NextLoopBegan => self.began += count,
			ScheduleTiming::CurrentLoopEnded => self.ended += count,
			ScheduleTiming::Idle => self.idle += count,
		}
	}
}

/// Cooperative task queue owned by a single thread.
///
/// Tasks never run synchronously from [`RunLoop::schedule`]; they wait for
/// the owner to call [`RunLoop::run_turn`]. A task scheduled from inside a
/// phase fires no earlier than the following phase.
pub struct RunLoop {
	queue: RefCell<VecDeque<Task>>,
	turns: Cell<u64>,
	mode: RefCell<Option<RunLoopMode>>,
}

impl Default for RunLoop {
	fn default() -> Self {
		Self::new()
	}
}

impl RunLoop {
	/// Creates a detached loop, not bound to any thread.
	pub fn new() -> Self {
		Self {
			queue: RefCell::new(VecDeque::new()),
			turns: Cell::new(0),
			mode: RefCell::new(None),
		}
	}

	/// Returns the calling thread's loop.
	pub fn current() -> Rc<RunLoop> {
		CURRENT.with(Rc::clone)
	}

	/// Schedules `task` in the default mode.
	pub fn schedule(&self, timing: ScheduleTiming, task: impl FnOnce() + 'static) {
		self.push(Task {
			modes: smallvec![RunLoopMode::Default],
			timing,
			run: Box::new(task),
		});
	}

	/// Schedules `task` to fire in any of `modes`.
	pub fn schedule_in(
		&self,
		modes: impl IntoIterator<Item = RunLoopMode>,
		timing: ScheduleTiming,
		task: impl FnOnce() + 'static,
	) {
		let mut modes: smallvec::SmallVec<[RunLoopMode; 2]> = modes.into_iter().collect();
		if modes.is_empty() {
			modes.push(RunLoopMode::Default);
		}
		self.push(Task {
			modes,
			timing,
			run: Box::new(task),
		});
	}

	fn push(&self, task: Task) {
		let mut queue = self.queue.borrow_mut();
		queue.push_back(task);
		tracing::trace!(pending = queue.len(), "run loop task scheduled");
	}

	/// Number of queued tasks, fireable or not.
	pub fn pending(&self) -> usize {
		self.queue.borrow().len()
	}

	/// Number of completed turns.
	pub fn turns(&self) -> u64 {
		self.turns.get()
	}

	/// Mode of the turn in progress, if any.
	pub fn current_mode(&self) -> Option<RunLoopMode> {
		self.mode.borrow().clone()
	}

	/// Turns the loop once in the default mode.
	pub fn run_turn(&self) -> TurnReport {
		self.run_turn_in(RunLoopMode::Default)
	}

	/// Turns the loop once in `mode`.
	///
	/// Visits the began, ended and idle phases in order. Each phase runs the
	/// tasks that were queued for it before the phase started. The idle phase
	/// is skipped while began or ended work is still pending for `mode`.
	pub fn run_turn_in(&self, mode: RunLoopMode) -> TurnReport {
		let outer = self.mode.replace(Some(mode.clone()));
		let mut report = TurnReport::default();

		for timing in ScheduleTiming::PHASES {
			if timing == ScheduleTiming::Idle && self.has_busy_work(&mode) {
				break;
			}
			let tasks = self.take_phase(timing, &mode);
			report.record(timing, tasks.len());
			for task in tasks {
				(task.run)();
			}
		}

		*self.mode.borrow_mut() = outer;
		self.turns.set(self.turns.get() + 1);
		if report.executed() > 0 {
			tracing::trace!(?mode, executed = report.executed(), "run loop turn");
		}
		report
	}

	/// Turns the loop in `mode` until a turn executes nothing, at most
	/// `max_turns` times. Returns the number of tasks executed.
	pub fn run_until_idle(&self, mode: RunLoopMode, max_turns: usize) -> usize {
		let mut executed = 0;
		for _ in 0..max_turns {
			let report = self.run_turn_in(mode.clone());
			if report.executed() == 0 {
				break;
			}
			executed += report.executed();
		}
		executed
	}

	fn has_busy_work(&self, mode: &RunLoopMode) -> bool {
		self.queue
			.borrow()
			.iter()
			.any(|t| t.timing != ScheduleTiming::Idle && t.fires_in(mode))
	}

	fn take_phase(&self, timing: ScheduleTiming, mode: &RunLoopMode) -> Vec<Task> {
		let mut queue = self.queue.borrow_mut();
		let mut taken = Vec::new();
		let mut kept = VecDeque::with_capacity(queue.len());
		for task in queue.drain(..) {
			if task.timing == timing && task.fires_in(mode) {
				taken.push(task);
			} else {
				kept.push_back(task);
			}
		}
		*queue = kept;
		taken
	}
}

/// Schedules `task` on the calling thread's loop in the default mode.
pub fn schedule(timing: ScheduleTiming, task: impl FnOnce() + 'static) {
	RunLoop::current().schedule(timing, task);
}

/// Schedules `task` on the calling thread's loop in `modes`.
pub fn schedule_in(
	modes: impl IntoIterator<Item = RunLoopMode>,
	timing: ScheduleTiming,
	task: impl FnOnce() + 'static,
) {
	RunLoop::current().schedule_in(modes, timing, task);
}
