mod jobs;
mod march;

use grapher_expr::EquationModel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use self::jobs::*;
use self::march::Lattice;
use crate::{PlotConfig, ViewTransform, Viewport};

/// A piece of an implicit curve in equation space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
	pub x1: f64,
	pub y1: f64,
	pub x2: f64,
	pub y2: f64,
}

impl Segment {
	#[must_use]
	pub fn midpoint(self) -> (f64, f64) {
		(f64::midpoint(self.x1, self.x2), f64::midpoint(self.y1, self.y2))
	}

	#[must_use]
	pub fn length(self) -> f64 {
		(self.x2 - self.x1).hypot(self.y2 - self.y1)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourQuality {
	/// The coarse grid, recomputed every interaction frame.
	Preview,
	/// The refined lattice from a background job.
	Fine,
}

/// Segments for one equation, tagged with the viewport they were traced under.
#[derive(Debug, Clone)]
pub struct ContourCache {
	segments: Vec<Segment>,
	viewport: Viewport,
	quality: ContourQuality,
}

impl ContourCache {
	#[must_use]
	pub const fn new(segments: Vec<Segment>, viewport: Viewport, quality: ContourQuality) -> Self {
		Self {
			segments,
			viewport,
			quality,
		}
	}

	#[must_use]
	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	#[must_use]
	pub const fn transform(&self) -> ViewTransform {
		self.viewport.transform()
	}

	#[must_use]
	pub const fn quality(&self) -> ContourQuality {
		self.quality
	}

	#[must_use]
	pub fn is_fine(&self) -> bool {
		matches!(self.quality, ContourQuality::Fine)
	}

	/// Whether the segments still serve `viewport`: same scale and surface, and
	/// the center moved less than `tolerance` of the visible span on each axis.
	#[must_use]
	pub fn is_reusable(&self, viewport: &Viewport, tolerance: f64) -> bool {
		let (cached, current) = (self.viewport.transform(), viewport.transform());

		if cached.scale() != current.scale()
			|| self.viewport.width() != viewport.width()
			|| self.viewport.height() != viewport.height()
		{
			return false;
		}

		let span_x = viewport.width() / current.scale();
		let span_y = viewport.height() / current.scale();

		(cached.center_x - current.center_x).abs() <= tolerance * span_x
			&& (cached.center_y - current.center_y).abs() <= tolerance * span_y
	}
}

fn cells(extent: f64, cell: f64) -> usize {
	let count = (extent / cell).ceil();

	if count.is_finite() && count > 0.0 {
		count as usize
	} else {
		0
	}
}

/// Marching squares over the visible canvas at roughly `coarse_cell_px`.
#[tracing::instrument(level = "debug", skip_all, fields(raw = model.raw()))]
#[must_use]
pub fn coarse_pass(model: &EquationModel, viewport: &Viewport, config: &PlotConfig) -> Vec<Segment> {
	let cell = config.coarse_cell_px / viewport.scale();
	let columns = cells(viewport.width(), config.coarse_cell_px);
	let rows = cells(viewport.height(), config.coarse_cell_px);

	if columns == 0 || rows == 0 || !cell.is_finite() {
		return Vec::new();
	}

	let (min_x, _) = viewport.visible_x_range();
	let (_, max_y) = viewport.visible_y_range();

	let segments = Lattice::evaluate(model, min_x, max_y, cell, cell, columns, rows).march();

	debug!("coarse pass over {columns}x{rows} cells: {} segments", segments.len());

	segments
}

/// The refined contour over a region slightly larger than the visible one.
/// Only outer cells whose corners disagree in sign are subdivided. Returns
/// `None` once `cancel` fires, discarding everything computed so far.
#[tracing::instrument(level = "debug", skip_all, fields(raw = model.raw()))]
pub fn fine_pass(
	model: &EquationModel,
	viewport: &Viewport,
	config: &PlotConfig,
	cancel: &CancelToken,
) -> Option<Vec<Segment>> {
	let transform = viewport.transform();
	let scale = transform.scale();
	let half_width = viewport.width() / scale / 2.0 * config.fine_region_factor;
	let half_height = viewport.height() / scale / 2.0 * config.fine_region_factor;

	let step = config.fine_coarse_step_px / scale;
	let columns = cells(2.0 * half_width, step);
	let rows = cells(2.0 * half_height, step);

	if columns == 0 || rows == 0 || !step.is_finite() {
		return Some(Vec::new());
	}

	let outer = Lattice::evaluate(
		model,
		transform.center_x - half_width,
		transform.center_y + half_height,
		step,
		step,
		columns,
		rows,
	);

	if cancel.is_cancelled() {
		trace!("cancelled after outer lattice");
		return None;
	}

	let candidates = (0..outer.rows())
		.flat_map(|j| (0..outer.columns()).map(move |i| (i, j)))
		.filter(|&(i, j)| outer.straddles(i, j))
		.collect::<Vec<_>>();

	let n = config.fine_subdivisions.max(1);
	let fine = step / n as f64;

	let pieces = candidates
		.par_iter()
		.map(|&(i, j)| {
			if cancel.is_cancelled() {
				return None;
			}

			Some(Lattice::evaluate_local(model, outer.x(i), outer.y(j), fine, fine, n, n).march_local())
		})
		.collect::<Option<Vec<_>>>()?;

	if cancel.is_cancelled() {
		trace!("cancelled after refinement");
		return None;
	}

	let segments = pieces.into_iter().flatten().collect::<Vec<_>>();

	debug!(
		"fine pass refined {} of {} cells: {} segments",
		candidates.len(),
		columns * rows,
		segments.len()
	);

	Some(segments)
}

#[cfg(test)]
mod tests {
	use grapher_expr::EquationModel;

	use super::{CancelToken, ContourCache, ContourQuality, coarse_pass, fine_pass};
	use crate::{PlotConfig, Viewport};

	#[test]
	fn unit_circle_midpoints_lie_on_the_circle() {
		let model = EquationModel::compile("x^2+y^2-1");
		let viewport = Viewport::new(800.0, 600.0, 200.0);
		let config = PlotConfig::default();

		let segments = fine_pass(&model, &viewport, &config, &CancelToken::new()).unwrap();
		let fine_step = config.fine_coarse_step_px / viewport.scale() / config.fine_subdivisions as f64;

		assert!(segments.len() > 100);
		for segment in &segments {
			let (x, y) = segment.midpoint();
			assert!((x.hypot(y) - 1.0).abs() <= fine_step, "{segment:?}");
		}
	}

	#[test]
	fn fine_pass_is_deterministic() {
		let model = EquationModel::compile("sin(x*y) = 0.3");
		let viewport = Viewport::new(640.0, 480.0, 40.0);
		let config = PlotConfig::default();

		let a = fine_pass(&model, &viewport, &config, &CancelToken::new()).unwrap();
		let b = fine_pass(&model, &viewport, &config, &CancelToken::new()).unwrap();

		assert!(!a.is_empty());
		assert_eq!(a, b);
	}

	#[test]
	fn cancelled_pass_yields_nothing() {
		let model = EquationModel::compile("x^2+y^2=4");
		let viewport = Viewport::new(800.0, 600.0, 50.0);
		let cancel = CancelToken::new();
		cancel.cancel();

		assert!(fine_pass(&model, &viewport, &PlotConfig::default(), &cancel).is_none());
	}

	#[test]
	fn coarse_pass_traces_a_preview() {
		let model = EquationModel::compile("x^2+y^2=9");
		let viewport = Viewport::new(800.0, 600.0, 50.0);

		let segments = coarse_pass(&model, &viewport, &PlotConfig::default());

		assert!(!segments.is_empty());
		for segment in &segments {
			let (x, y) = segment.midpoint();
			assert!((x.hypot(y) - 3.0).abs() < 0.4);
		}
	}

	#[test]
	fn invalid_equation_traces_nothing() {
		let model = EquationModel::compile("x^2 + = y");
		let viewport = Viewport::new(800.0, 600.0, 50.0);

		assert!(coarse_pass(&model, &viewport, &PlotConfig::default()).is_empty());
	}

	#[test]
	fn reuse_tolerates_small_drift_only() {
		let viewport = Viewport::new(800.0, 600.0, 50.0);
		let cache = ContourCache::new(Vec::new(), viewport, ContourQuality::Fine);

		let mut drifted = viewport;
		drifted.pan_pixels(60.0, 0.0);
		assert!(cache.is_reusable(&drifted, 0.1));

		drifted.pan_pixels(40.0, 0.0);
		assert!(!cache.is_reusable(&drifted, 0.1));

		let mut zoomed = viewport;
		zoomed.zoom_in(1.1);
		assert!(!cache.is_reusable(&zoomed, 0.1));
	}
}
