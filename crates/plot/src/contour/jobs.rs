use std::{
	collections::BTreeMap,
	mem,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
		mpsc::{self, Receiver, RecvTimeoutError, Sender},
	},
	time::{Duration, Instant},
};

use grapher_expr::EquationModel;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, trace};

use super::{Segment, fine_pass};
use crate::{EquationId, PlotConfig, Viewport};

/// Raised once by the owner, polled by a running job between units of work.
#[derive(Debug, Default)]
pub struct CancelToken {
	cancelled: AtomicBool,
}

impl CancelToken {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			cancelled: AtomicBool::new(false),
		}
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Acquire)
	}
}

/// Two worker pools: one for passes the caller waits on, one for fine passes.
/// Keeping them apart means a long refinement never sits in front of a
/// preview in the same queue.
#[derive(Debug)]
pub struct ContourExecutor {
	interactive: ThreadPool,
	background: ThreadPool,
}

impl ContourExecutor {
	pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
		let interactive = ThreadPoolBuilder::new()
			.num_threads(threads)
			.thread_name(|i| format!("plot-{i}"))
			.build()?;
		let background = ThreadPoolBuilder::new()
			.num_threads(threads)
			.thread_name(|i| format!("contour-{i}"))
			.build()?;

		debug!(
			"started {} plot workers and {} contour workers",
			interactive.current_num_threads(),
			background.current_num_threads()
		);

		Ok(Self {
			interactive,
			background,
		})
	}

	#[must_use]
	pub fn threads(&self) -> usize {
		self.interactive.current_num_threads()
	}

	/// Runs `op` on the interactive pool so that nested parallel iterators
	/// use it.
	pub fn install<R, F>(&self, op: F) -> R
	where
		F: FnOnce() -> R + Send,
		R: Send,
	{
		self.interactive.install(op)
	}

	fn spawn(&self, job: impl FnOnce() + Send + 'static) {
		self.background.spawn(job);
	}
}

/// A fine pass that ran to completion and is still the newest for its id.
#[derive(Debug)]
pub struct FinishedContour {
	pub id: EquationId,
	pub viewport: Viewport,
	pub segments: Vec<Segment>,
}

#[derive(Debug)]
struct Outcome {
	id: EquationId,
	ticket: u64,
	viewport: Viewport,
	segments: Option<Vec<Segment>>,
}

#[derive(Debug)]
struct InFlight {
	ticket: u64,
	viewport: Viewport,
	cancel: Arc<CancelToken>,
}

/// Tracks at most one fine pass per equation. Results travel back over a
/// channel and are only handed out by [`Self::drain`] and [`Self::wait`], so
/// the owner of this value is the single writer of contour caches.
#[derive(Debug)]
pub struct ContourJobs {
	next_ticket: u64,
	in_flight: BTreeMap<EquationId, InFlight>,
	sender: Sender<Outcome>,
	receiver: Receiver<Outcome>,
}

impl ContourJobs {
	#[must_use]
	pub fn new() -> Self {
		let (sender, receiver) = mpsc::channel();

		Self {
			next_ticket: 0,
			in_flight: BTreeMap::new(),
			sender,
			receiver,
		}
	}

	/// Starts a fine pass for `id`, cancelling whichever one was running.
	pub fn spawn(
		&mut self,
		executor: &ContourExecutor,
		id: EquationId,
		model: Arc<EquationModel>,
		viewport: Viewport,
		config: PlotConfig,
	) -> u64 {
		self.cancel(id);

		let ticket = self.next_ticket;
		self.next_ticket += 1;

		let cancel = Arc::new(CancelToken::new());
		self.in_flight.insert(
			id,
			InFlight {
				ticket,
				viewport,
				cancel: Arc::clone(&cancel),
			},
		);

		let sender = self.sender.clone();
		executor.spawn(move || {
			let segments = fine_pass(&model, &viewport, &config, &cancel);

			_ = sender.send(Outcome {
				id,
				ticket,
				viewport,
				segments,
			});
		});

		trace!("spawned fine pass {ticket} for {id}");

		ticket
	}

	/// Returns `true` if a job was running for `id`.
	pub fn cancel(&mut self, id: EquationId) -> bool {
		self.in_flight.remove(&id).is_some_and(|job| {
			job.cancel.cancel();
			trace!("cancelled fine pass {} for {id}", job.ticket);
			true
		})
	}

	pub fn cancel_all(&mut self) {
		for (_, job) in mem::take(&mut self.in_flight) {
			job.cancel.cancel();
		}
	}

	#[must_use]
	pub fn is_running(&self, id: EquationId) -> bool {
		self.in_flight.contains_key(&id)
	}

	/// Whether a pass for `id` is already tracing exactly this view.
	#[must_use]
	pub fn is_running_for(&self, id: EquationId, viewport: &Viewport) -> bool {
		self.in_flight
			.get(&id)
			.is_some_and(|job| job.viewport == *viewport)
	}

	#[must_use]
	pub fn running(&self) -> usize {
		self.in_flight.len()
	}

	/// Collects every result that arrived, without blocking.
	pub fn drain(&mut self) -> Vec<FinishedContour> {
		let mut finished = Vec::new();

		while let Ok(outcome) = self.receiver.try_recv() {
			finished.extend(self.accept(outcome));
		}

		finished
	}

	/// Blocks until no job is running or `timeout` passes.
	pub fn wait(&mut self, timeout: Duration) -> Vec<FinishedContour> {
		let deadline = Instant::now() + timeout;
		let mut finished = self.drain();

		while !self.in_flight.is_empty() {
			let remaining = deadline.saturating_duration_since(Instant::now());

			match self.receiver.recv_timeout(remaining) {
				Ok(outcome) => finished.extend(self.accept(outcome)),
				Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
			}
		}

		finished
	}

	fn accept(&mut self, outcome: Outcome) -> Option<FinishedContour> {
		let current = self
			.in_flight
			.get(&outcome.id)
			.is_some_and(|job| job.ticket == outcome.ticket);

		if !current {
			trace!("dropping stale fine pass {} for {}", outcome.ticket, outcome.id);
			return None;
		}

		self.in_flight.remove(&outcome.id);

		Some(FinishedContour {
			id: outcome.id,
			viewport: outcome.viewport,
			segments: outcome.segments?,
		})
	}

	/// Cancels everything still running. Results that arrive afterwards are
	/// dropped with the channel.
	pub fn shutdown(mut self) {
		self.cancel_all();
	}
}

impl Default for ContourJobs {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{Arc, mpsc},
		time::Duration,
	};

	use grapher_expr::EquationModel;

	use super::{CancelToken, ContourExecutor, ContourJobs};
	use crate::{EquationId, PlotConfig, Viewport, contour::fine_pass};

	const TIMEOUT: Duration = Duration::from_secs(30);

	#[test]
	fn install_runs_while_background_is_busy() -> Result<(), rayon::ThreadPoolBuildError> {
		let executor = ContourExecutor::new(1)?;
		let (release, blocked) = mpsc::channel::<()>();

		executor.spawn(move || {
			_ = blocked.recv();
		});

		assert_eq!(executor.install(|| 6 * 7), 42);
		assert_eq!(executor.threads(), 1);

		release.send(()).ok();

		Ok(())
	}

	#[test]
	fn finished_job_matches_direct_pass() -> Result<(), rayon::ThreadPoolBuildError> {
		let executor = ContourExecutor::new(2)?;
		let mut jobs = ContourJobs::new();
		let model = Arc::new(EquationModel::compile("x^2 + y^2 = 4"));
		let viewport = Viewport::new(400.0, 300.0, 50.0);
		let config = PlotConfig::default();

		jobs.spawn(&executor, EquationId::new(0), Arc::clone(&model), viewport, config.clone());
		let finished = jobs.wait(TIMEOUT);

		assert_eq!(finished.len(), 1);
		assert_eq!(
			Some(finished[0].segments.clone()),
			fine_pass(&model, &viewport, &config, &CancelToken::new())
		);
		assert_eq!(jobs.running(), 0);

		Ok(())
	}

	#[test]
	fn respawn_supersedes_previous_job() -> Result<(), rayon::ThreadPoolBuildError> {
		let executor = ContourExecutor::new(1)?;
		let mut jobs = ContourJobs::new();
		let model = Arc::new(EquationModel::compile("x*y = 1"));
		let viewport = Viewport::new(400.0, 300.0, 50.0);
		let id = EquationId::new(3);

		let first = jobs.spawn(&executor, id, Arc::clone(&model), viewport, PlotConfig::default());
		let second = jobs.spawn(&executor, id, model, viewport, PlotConfig::default());
		assert_ne!(first, second);

		let finished = jobs.wait(TIMEOUT);

		assert_eq!(finished.len(), 1);
		assert_eq!(finished[0].id, id);
		assert!(!jobs.is_running(id));

		Ok(())
	}

	#[test]
	fn cancelled_job_never_surfaces() -> Result<(), rayon::ThreadPoolBuildError> {
		let executor = ContourExecutor::new(1)?;
		let mut jobs = ContourJobs::new();
		let id = EquationId::new(1);

		jobs.spawn(
			&executor,
			id,
			Arc::new(EquationModel::compile("x^2 = y^3")),
			Viewport::new(400.0, 300.0, 50.0),
			PlotConfig::default(),
		);
		assert!(jobs.cancel(id));

		assert!(jobs.wait(Duration::from_millis(200)).is_empty());
		assert!(jobs.drain().is_empty());

		Ok(())
	}
}
