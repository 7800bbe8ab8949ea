use grapher_expr::EquationModel;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::PlotConfig;

const INDEX_SNAP: f64 = 1e-9;

/// A strip of `y = f(x)` samples wider than the visible range, stored as a ring
/// so that whole-step pans only evaluate the samples that scrolled in.
#[derive(Debug, Clone)]
pub struct SampleCache {
	origin: f64,
	offset: i64,
	step: f64,
	samples: Vec<f64>,
	start_index: usize,
	visible_width: f64,
	pixel_width: f64,
}

impl SampleCache {
	#[tracing::instrument(level = "debug", skip_all, fields(raw = model.raw()))]
	#[must_use]
	pub fn build(
		model: &EquationModel,
		visible_min_x: f64,
		visible_max_x: f64,
		pixel_width: f64,
		config: &PlotConfig,
	) -> Self {
		let visible_width = visible_max_x - visible_min_x;
		let buffer_width = visible_width * config.sample_buffer_factor;
		let count = (pixel_width * config.sample_buffer_factor * config.samples_per_pixel).max(0.0)
			as usize;
		let step = buffer_width / count as f64;
		let origin = visible_min_x - visible_width * (config.sample_buffer_factor - 1.0) / 2.0;

		if count < 2 || !step.is_finite() || step <= 0.0 {
			debug!("degenerate strip, nothing sampled");
			return Self::empty(visible_width, pixel_width);
		}

		let samples = (0..count)
			.into_par_iter()
			.map(|i| model.eval_explicit((i as f64).mul_add(step, origin)))
			.collect::<Vec<_>>();

		debug!("sampled {count} points at step {step}");

		Self {
			origin,
			offset: 0,
			step,
			samples,
			start_index: 0,
			visible_width,
			pixel_width,
		}
	}

	const fn empty(visible_width: f64, pixel_width: f64) -> Self {
		Self {
			origin: 0.0,
			offset: 0,
			step: 0.0,
			samples: Vec::new(),
			start_index: 0,
			visible_width,
			pixel_width,
		}
	}

	#[must_use]
	pub const fn len(&self) -> usize {
		self.samples.len()
	}

	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}

	#[must_use]
	pub const fn step(&self) -> f64 {
		self.step
	}

	#[must_use]
	pub fn x_start(&self) -> f64 {
		(self.offset as f64).mul_add(self.step, self.origin)
	}

	#[must_use]
	pub fn x_end(&self) -> f64 {
		(self.samples.len().saturating_sub(1) as f64).mul_add(self.step, self.x_start())
	}

	/// The x of the `index`th sample of the strip.
	#[must_use]
	pub fn sample_x(&self, index: usize) -> f64 {
		((self.offset + index as i64) as f64).mul_add(self.step, self.origin)
	}

	fn sample(&self, index: usize) -> f64 {
		self.samples[(self.start_index + index) % self.samples.len()]
	}

	/// Linear interpolation between the two samples around `x`, NaN outside the
	/// strip.
	#[must_use]
	pub fn get_y(&self, x: f64) -> f64 {
		if self.samples.len() < 2 {
			return f64::NAN;
		}

		let mut index = (x - self.x_start()) / self.step;
		let nearest = index.round();
		if (index - nearest).abs() < INDEX_SNAP {
			index = nearest;
		}

		if !index.is_finite() || index < 0.0 {
			return f64::NAN;
		}

		let i0 = index.floor() as usize;
		let t = index - i0 as f64;

		if i0 >= self.samples.len() || (t > 0.0 && i0 + 1 >= self.samples.len()) {
			return f64::NAN;
		}

		let y0 = self.sample(i0);
		if t == 0.0 {
			return y0;
		}

		let y1 = self.sample(i0 + 1);
		t.mul_add(y1 - y0, y0)
	}

	/// Whether the strip still serves a viewport with this visible range and
	/// surface width without resampling.
	#[must_use]
	pub fn serves(&self, visible_min_x: f64, visible_max_x: f64, pixel_width: f64) -> bool {
		!self.is_empty()
			&& self.pixel_width == pixel_width
			&& same_span(self.visible_width, visible_max_x - visible_min_x)
			&& visible_min_x >= self.x_start()
			&& visible_max_x <= self.x_end()
	}

	/// Re-centers the strip on a viewport of unchanged width by shifting whole
	/// steps. Returns `false` if the shift is too large to be worth it, in which
	/// case nothing changed.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn slide(
		&mut self,
		model: &EquationModel,
		visible_min_x: f64,
		visible_max_x: f64,
		config: &PlotConfig,
	) -> bool {
		if self.is_empty() || !same_span(self.visible_width, visible_max_x - visible_min_x) {
			return false;
		}

		let wanted_start =
			visible_min_x - self.visible_width * (config.sample_buffer_factor - 1.0) / 2.0;
		let shift = ((wanted_start - self.x_start()) / self.step).round();
		let len = self.samples.len();

		if !shift.is_finite() || shift.abs() >= len as f64 {
			return false;
		}

		let shift = shift as i64;
		let count = shift.unsigned_abs() as usize;

		let (first_new, first_slot) = if shift > 0 {
			(self.offset + len as i64, self.start_index)
		} else {
			(self.offset + shift, (self.start_index + len - count) % len)
		};

		let fresh = (0..count)
			.into_par_iter()
			.map(|k| model.eval_explicit(((first_new + k as i64) as f64).mul_add(self.step, self.origin)))
			.collect::<Vec<_>>();

		for (k, value) in fresh.into_iter().enumerate() {
			self.samples[(first_slot + k) % len] = value;
		}

		self.start_index = if shift > 0 {
			(self.start_index + count) % len
		} else {
			first_slot
		};
		self.offset += shift;

		trace!("slid strip by {shift} samples");

		true
	}
}

fn same_span(a: f64, b: f64) -> bool {
	(a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}
