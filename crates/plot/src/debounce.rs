use std::{
	collections::BTreeMap,
	time::{Duration, Instant},
};

/// Coalesces bursts of events per key: a key becomes due once `delay` has
/// passed since the last time it was scheduled. Time is supplied by the
/// caller so the owner's event loop stays in charge of the clock.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
	delay: Duration,
	deadlines: BTreeMap<K, Instant>,
}

impl<K: Ord + Copy> Debouncer<K> {
	#[must_use]
	pub const fn new(delay: Duration) -> Self {
		Self {
			delay,
			deadlines: BTreeMap::new(),
		}
	}

	#[must_use]
	pub const fn delay(&self) -> Duration {
		self.delay
	}

	/// (Re)starts the quiet period for `key`.
	pub fn schedule(&mut self, key: K, now: Instant) {
		self.deadlines.insert(key, now + self.delay);
	}

	pub fn cancel(&mut self, key: K) -> bool {
		self.deadlines.remove(&key).is_some()
	}

	pub fn clear(&mut self) {
		self.deadlines.clear();
	}

	#[must_use]
	pub fn is_pending(&self, key: K) -> bool {
		self.deadlines.contains_key(&key)
	}

	#[must_use]
	pub fn next_deadline(&self) -> Option<Instant> {
		self.deadlines.values().min().copied()
	}

	/// Removes and returns, in key order, every key whose quiet period is over.
	pub fn take_due(&mut self, now: Instant) -> Vec<K> {
		let due = self
			.deadlines
			.iter()
			.filter(|(_, deadline)| **deadline <= now)
			.map(|(key, _)| *key)
			.collect::<Vec<_>>();

		for key in &due {
			self.deadlines.remove(key);
		}

		due
	}
}
