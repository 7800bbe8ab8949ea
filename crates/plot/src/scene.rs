use std::{
	collections::BTreeMap,
	fmt::{Display, Formatter, Result as FmtResult, Write as _},
	sync::Arc,
	time::{Duration, Instant},
};

use grapher_expr::{Classification, EquationModel, ParameterInfo, ParameterRange};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
	ContourCache, ContourExecutor, ContourJobs, ContourQuality, Debouncer, DerivedPoint,
	FinishedContour, Palette, PlotConfig, Rgb, SampleCache, SceneError, ViewTransform, Viewport,
	coarse_pass, intersections, x_intercepts, y_intercept,
};

/// Pins closer than this to a clicked point are removed instead of added.
pub const PIN_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EquationId(u64);

impl EquationId {
	#[must_use]
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	#[must_use]
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl Display for EquationId {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_char('#')?;
		Display::fmt(&self.0, f)
	}
}

/// One row of the equation table.
#[derive(Debug)]
pub struct Equation {
	model: Arc<EquationModel>,
	color: Rgb,
	samples: Option<SampleCache>,
	contour: Option<ContourCache>,
}

impl Equation {
	fn new(model: EquationModel, color: Rgb) -> Self {
		Self {
			model: Arc::new(model),
			color,
			samples: None,
			contour: None,
		}
	}

	#[must_use]
	pub const fn model(&self) -> &Arc<EquationModel> {
		&self.model
	}

	#[must_use]
	pub const fn color(&self) -> Rgb {
		self.color
	}

	#[must_use]
	pub const fn samples(&self) -> Option<&SampleCache> {
		self.samples.as_ref()
	}

	#[must_use]
	pub const fn contour(&self) -> Option<&ContourCache> {
		self.contour.as_ref()
	}

	fn evict(&mut self) {
		self.samples = None;
		self.contour = None;
	}

	/// `y` at `x`, from the sample strip where it reaches and straight from the
	/// model elsewhere.
	fn value_at(&self, x: f64) -> f64 {
		match &self.samples {
			Some(samples) if x >= samples.x_start() && x <= samples.x_end() => samples.get_y(x),
			_ => self.model.eval_explicit(x),
		}
	}

	fn is_curve(&self) -> bool {
		self.model.is_valid() && self.model.is_explicit()
	}
}

/// What sits under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hover {
	pub x: f64,
	pub y: f64,
	pub color: Rgb,
	/// Intersections and intercepts can be pinned, plain curve points cannot.
	pub snappable: bool,
}

/// Owns the equations, their caches and the background contour jobs, and
/// decides when each of them is refreshed.
#[derive(Debug)]
pub struct Scene {
	config: PlotConfig,
	viewport: Viewport,
	equations: BTreeMap<EquationId, Equation>,
	next_id: u64,
	palette: Palette,
	executor: ContourExecutor,
	jobs: ContourJobs,
	parameter_refresh: Debouncer<EquationId>,
	text_edits: Debouncer<EquationId>,
	pending_text: BTreeMap<EquationId, String>,
	interacting: bool,
	scroll_settles_at: Option<Instant>,
	intercepts: Vec<DerivedPoint>,
	intersections: Vec<DerivedPoint>,
	pins: Vec<(f64, f64)>,
}

impl Scene {
	pub fn new(config: PlotConfig, width: f64, height: f64) -> Result<Self, SceneError> {
		let executor = ContourExecutor::new(config.worker_threads())?;

		Ok(Self::with_executor(config, width, height, executor))
	}

	#[must_use]
	pub fn with_executor(
		config: PlotConfig,
		width: f64,
		height: f64,
		executor: ContourExecutor,
	) -> Self {
		Self {
			viewport: Viewport::new(width, height, config.default_scale),
			equations: BTreeMap::new(),
			next_id: 0,
			palette: Palette::new(),
			executor,
			jobs: ContourJobs::new(),
			parameter_refresh: Debouncer::new(config.parameter_debounce()),
			text_edits: Debouncer::new(config.edit_debounce()),
			pending_text: BTreeMap::new(),
			interacting: false,
			scroll_settles_at: None,
			intercepts: Vec::new(),
			intersections: Vec::new(),
			pins: Vec::new(),
			config,
		}
	}

	#[must_use]
	pub const fn config(&self) -> &PlotConfig {
		&self.config
	}

	#[must_use]
	pub const fn viewport(&self) -> &Viewport {
		&self.viewport
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.equations.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.equations.is_empty()
	}

	#[must_use]
	pub fn equation(&self, id: EquationId) -> Option<&Equation> {
		self.equations.get(&id)
	}

	/// Equations in insertion order.
	pub fn equations(&self) -> impl Iterator<Item = (EquationId, &Equation)> {
		self.equations.iter().map(|(id, equation)| (*id, equation))
	}

	pub fn texts(&self) -> impl Iterator<Item = &str> {
		self.equations.values().map(|equation| equation.model.raw())
	}

	fn entry_mut(&mut self, id: EquationId) -> Result<&mut Equation, SceneError> {
		self.equations
			.get_mut(&id)
			.ok_or(SceneError::UnknownEquation(id))
	}

	fn compile(&self, text: &str) -> EquationModel {
		EquationModel::compile_with_probe(text, self.config.linear_probe_x)
	}

	pub fn add_equation(&mut self, text: &str) -> EquationId {
		let color = self.palette.next_color();
		self.add_equation_with_color(text, color)
	}

	pub fn add_equation_with_color(&mut self, text: &str, color: Rgb) -> EquationId {
		let id = EquationId(self.next_id);
		self.next_id += 1;

		let model = self.compile(text);
		info!(%id, valid = model.is_valid(), "added equation");

		self.equations.insert(id, Equation::new(model, color));
		self.refresh_equation(id);
		self.refresh_derived();

		id
	}

	/// Recompiles `id` from `text`, keeping the values of parameters that
	/// survive the edit. Blank text removes the equation.
	pub fn set_text(&mut self, id: EquationId, text: &str) -> Result<(), SceneError> {
		if text.trim().is_empty() {
			return self.remove(id);
		}

		let model = self.compile(text);
		let entry = self.entry_mut(id)?;
		model.parameters().inherit(entry.model.parameters());

		entry.model = Arc::new(model);
		entry.evict();

		self.jobs.cancel(id);
		self.parameter_refresh.cancel(id);

		debug!(%id, "recompiled equation");

		self.refresh_equation(id);
		self.refresh_derived();

		Ok(())
	}

	/// Queues `text` for `id`; it is compiled once edits pause for
	/// `edit_debounce_ms`.
	pub fn edit_text(
		&mut self,
		id: EquationId,
		text: impl Into<String>,
		now: Instant,
	) -> Result<(), SceneError> {
		if !self.equations.contains_key(&id) {
			return Err(SceneError::UnknownEquation(id));
		}

		self.pending_text.insert(id, text.into());
		self.text_edits.schedule(id, now);

		Ok(())
	}

	pub fn remove(&mut self, id: EquationId) -> Result<(), SceneError> {
		self.equations
			.remove(&id)
			.ok_or(SceneError::UnknownEquation(id))?;

		self.jobs.cancel(id);
		self.parameter_refresh.cancel(id);
		self.text_edits.cancel(id);
		self.pending_text.remove(&id);

		info!(%id, "removed equation");

		self.refresh_derived();

		Ok(())
	}

	pub fn clear(&mut self) {
		self.equations.clear();
		self.jobs.cancel_all();
		self.parameter_refresh.clear();
		self.text_edits.clear();
		self.pending_text.clear();
		self.intercepts.clear();
		self.intersections.clear();
		self.pins.clear();
		self.palette.reset();
	}

	/// Recolours without recompiling or touching any cache.
	pub fn set_color(&mut self, id: EquationId, color: Rgb) -> Result<(), SceneError> {
		self.entry_mut(id)?.color = color;
		Ok(())
	}

	pub fn parameters(&self, id: EquationId) -> Result<Vec<ParameterInfo>, SceneError> {
		self.equations
			.get(&id)
			.map(|equation| equation.model.parameters().infos())
			.ok_or(SceneError::UnknownEquation(id))
	}

	/// Writes the value right away so evaluation sees it, evicts the caches of
	/// `id`, and schedules the rebuild for when the slider rests.
	pub fn set_parameter(
		&mut self,
		id: EquationId,
		name: char,
		value: f64,
		now: Instant,
	) -> Result<(), SceneError> {
		let entry = self.entry_mut(id)?;
		entry
			.model
			.parameters()
			.get(name)
			.ok_or(SceneError::UnknownParameter(id, name))?
			.set(value);
		entry.evict();

		self.jobs.cancel(id);
		self.parameter_refresh.schedule(id, now);

		trace!(%id, %name, value, "parameter written");

		Ok(())
	}

	pub fn set_parameter_range(
		&mut self,
		id: EquationId,
		name: char,
		min: f64,
		max: f64,
	) -> Result<(), SceneError> {
		let parameter = self
			.equations
			.get(&id)
			.ok_or(SceneError::UnknownEquation(id))?
			.model
			.parameters()
			.get(name)
			.ok_or(SceneError::UnknownParameter(id, name))?;

		if parameter.set_range(ParameterRange { min, max }) {
			Ok(())
		} else {
			Err(SceneError::InvalidRange { min, max })
		}
	}

	/// Marks the start of a drag. Fine contour passes wait until it ends.
	pub const fn begin_interaction(&mut self) {
		self.interacting = true;
	}

	pub fn end_interaction(&mut self) {
		self.interacting = false;
		self.refresh_all();
	}

	#[must_use]
	pub const fn is_interacting(&self) -> bool {
		self.interacting || self.scroll_settles_at.is_some()
	}

	/// Moves the plane by a drag delta in pixels. Outside an interaction the
	/// caches are refreshed right away.
	pub fn pan(&mut self, dx: f64, dy: f64) {
		self.viewport.pan_pixels(dx, dy);

		if !self.is_interacting() {
			self.refresh_all();
		}
	}

	/// One scroll step at the cursor. The refresh is deferred until scrolling
	/// has been quiet for `scroll_settle_ms`.
	pub fn zoom_at(&mut self, pixel_x: f64, pixel_y: f64, zoom_in: bool, now: Instant) {
		self.viewport
			.zoom_at(pixel_x, pixel_y, zoom_in, self.config.zoom_factor);
		self.scroll_settles_at = Some(now + self.config.scroll_settle());
	}

	pub fn zoom_in(&mut self) {
		self.viewport.zoom_in(self.config.zoom_factor);
		self.refresh_all();
	}

	pub fn zoom_out(&mut self) {
		self.viewport.zoom_out(self.config.zoom_factor);
		self.refresh_all();
	}

	pub fn reset_view(&mut self) {
		self.viewport.reset(self.config.default_scale);
		self.refresh_all();
	}

	pub fn set_view(&mut self, transform: ViewTransform) {
		self.viewport.set_transform(transform);
		self.refresh_all();
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
		self.refresh_all();
	}

	/// Fires whatever became due by `now` and installs finished contour jobs.
	/// Returns `true` if anything visible may have changed.
	pub fn poll(&mut self, now: Instant) -> bool {
		let mut changed = false;

		for id in self.text_edits.take_due(now) {
			let Some(text) = self.pending_text.remove(&id) else {
				continue;
			};

			match self.set_text(id, &text) {
				Ok(()) => changed = true,
				Err(e) => debug!("dropping edit: {e}"),
			}
		}

		let due = self.parameter_refresh.take_due(now);
		if !due.is_empty() {
			for id in due {
				self.refresh_equation(id);
			}

			self.refresh_derived();
			changed = true;
		}

		if self.scroll_settles_at.is_some_and(|at| at <= now) {
			self.scroll_settles_at = None;
			self.refresh_all();
			changed = true;
		}

		let finished = self.jobs.drain();
		changed |= self.install(finished);

		changed
	}

	/// When [`Self::poll`] next has something to do, ignoring contour jobs.
	#[must_use]
	pub fn next_deadline(&self) -> Option<Instant> {
		[
			self.text_edits.next_deadline(),
			self.parameter_refresh.next_deadline(),
			self.scroll_settles_at,
		]
		.into_iter()
		.flatten()
		.min()
	}

	/// Blocks until every running fine pass is installed or `timeout` passes.
	/// Returns `true` if nothing is left running.
	pub fn wait_for_contours(&mut self, timeout: Duration) -> bool {
		let finished = self.jobs.wait(timeout);
		self.install(finished);

		self.jobs.running() == 0
	}

	#[must_use]
	pub fn is_refining(&self, id: EquationId) -> bool {
		self.jobs.is_running(id)
	}

	fn install(&mut self, finished: Vec<FinishedContour>) -> bool {
		let mut changed = false;

		for job in finished {
			if let Some(entry) = self.equations.get_mut(&job.id) {
				debug!(id = %job.id, segments = job.segments.len(), "installed fine contour");
				entry.contour = Some(ContourCache::new(
					job.segments,
					job.viewport,
					ContourQuality::Fine,
				));
				changed = true;
			}
		}

		changed
	}

	#[tracing::instrument(level = "debug", skip_all)]
	pub fn refresh_all(&mut self) {
		let ids = self.equations.keys().copied().collect::<Vec<_>>();

		for id in ids {
			self.refresh_equation(id);
		}

		self.refresh_derived();
	}

	/// Brings the caches of `id` in line with the current viewport.
	pub fn refresh_equation(&mut self, id: EquationId) {
		let Self {
			config,
			viewport,
			equations,
			executor,
			jobs,
			interacting,
			scroll_settles_at,
			..
		} = self;

		let Some(entry) = equations.get_mut(&id) else {
			return;
		};
		let model = Arc::clone(&entry.model);

		match model.classification() {
			Classification::Point { .. } => {}
			Classification::Explicit | Classification::LinearInY => {
				let (min, max) = viewport.visible_x_range();
				let width = viewport.width();

				let reusable = entry.samples.as_mut().is_some_and(|samples| {
					samples.serves(min, max, width)
						|| executor.install(|| {
							samples.slide(&model, min, max, config) && samples.serves(min, max, width)
						})
				});

				if !reusable {
					entry.samples = Some(
						executor.install(|| SampleCache::build(&model, min, max, width, config)),
					);
				}
			}
			Classification::Implicit => {
				let fine = entry.contour.as_ref().is_some_and(|contour| {
					contour.is_fine() && contour.is_reusable(viewport, config.cache_drift_tolerance)
				});

				if fine {
					trace!(%id, "fine contour still serves the view");
					return;
				}

				let preview = entry
					.contour
					.as_ref()
					.is_some_and(|contour| contour.is_reusable(viewport, 0.0));

				if !preview {
					let segments = executor.install(|| coarse_pass(&model, viewport, config));
					entry.contour = Some(ContourCache::new(
						segments,
						*viewport,
						ContourQuality::Preview,
					));
				}

				if *interacting || scroll_settles_at.is_some() {
					trace!(%id, "fine pass held back while interacting");
					return;
				}

				if !jobs.is_running_for(id, viewport) {
					jobs.spawn(executor, id, model, *viewport, config.clone());
				}
			}
		}
	}

	/// Recomputes intercepts and pairwise intersections of every explicit
	/// curve over the visible range.
	#[tracing::instrument(level = "debug", skip_all)]
	fn refresh_derived(&mut self) {
		let (min, max) = self.viewport.visible_x_range();
		let step = self.config.root_scan_step_px / self.viewport.scale();

		let curves = self
			.equations
			.values()
			.filter(|equation| equation.is_curve())
			.collect::<Vec<_>>();

		let intercepts = self.executor.install(|| {
			curves
				.par_iter()
				.flat_map_iter(|curve| {
					let f = |x| curve.value_at(x);
					y_intercept(min, max, f)
						.into_iter()
						.chain(x_intercepts(min, max, step, f))
				})
				.collect::<Vec<_>>()
		});

		let pairs = (0..curves.len())
			.flat_map(|i| (i + 1..curves.len()).map(move |j| (i, j)))
			.collect::<Vec<_>>();

		let crossings = self.executor.install(|| {
			pairs
				.par_iter()
				.flat_map_iter(|&(i, j)| {
					let (a, b) = (curves[i], curves[j]);
					intersections(min, max, step, |x| a.value_at(x), |x| b.value_at(x))
				})
				.collect::<Vec<_>>()
		});

		debug!(
			"{} intercepts, {} intersections",
			intercepts.len(),
			crossings.len()
		);

		self.intercepts = intercepts;
		self.intersections = crossings;
	}

	#[must_use]
	pub fn intercepts(&self) -> &[DerivedPoint] {
		&self.intercepts
	}

	#[must_use]
	pub fn intersections(&self) -> &[DerivedPoint] {
		&self.intersections
	}

	/// `y = f(x)` for an explicit curve, NaN for anything else.
	#[must_use]
	pub fn curve_y(&self, id: EquationId, x: f64) -> f64 {
		self.equations
			.get(&id)
			.filter(|equation| equation.model.is_explicit())
			.map_or(f64::NAN, |equation| equation.value_at(x))
	}

	/// One vertex per pixel column in equation space. A vertex with a NaN `y`
	/// marks a break: a gap in the domain or a jump taller than the surface.
	#[must_use]
	pub fn explicit_polyline(&self, id: EquationId) -> Vec<(f64, f64)> {
		let Some(equation) = self
			.equations
			.get(&id)
			.filter(|equation| equation.model.is_explicit())
		else {
			return Vec::new();
		};

		let mut points = Vec::new();
		let mut prev_pixel_y: Option<f64> = None;
		let columns = self.viewport.width().ceil().max(0.0) as usize;

		let push_break = |points: &mut Vec<(f64, f64)>, x: f64| {
			if points.last().is_some_and(|&(_, y)| !y.is_nan()) {
				points.push((x, f64::NAN));
			}
		};

		for column in 0..columns {
			let (x, _) = self.viewport.to_equation(column as f64, 0.0);
			let y = equation.value_at(x);

			if !y.is_finite() {
				push_break(&mut points, x);
				prev_pixel_y = None;
				continue;
			}

			let (_, pixel_y) = self.viewport.to_pixel(x, y);
			if prev_pixel_y.is_some_and(|prev| (pixel_y - prev).abs() > self.viewport.height()) {
				push_break(&mut points, x);
			}

			points.push((x, y));
			prev_pixel_y = Some(pixel_y);
		}

		points
	}

	/// The segments to draw for an implicit curve right now. A coarse preview
	/// is traced on the spot if nothing cached serves the current view.
	pub fn contour(&mut self, id: EquationId) -> Option<&ContourCache> {
		let Self {
			config,
			viewport,
			equations,
			executor,
			..
		} = self;

		let entry = equations
			.get_mut(&id)
			.filter(|equation| equation.model.is_implicit())?;

		let serves = entry.contour.as_ref().is_some_and(|contour| {
			let tolerance = if contour.is_fine() {
				config.cache_drift_tolerance
			} else {
				0.0
			};

			contour.is_reusable(viewport, tolerance)
		});

		if !serves {
			let model = Arc::clone(&entry.model);
			let segments = executor.install(|| coarse_pass(&model, viewport, config));
			entry.contour = Some(ContourCache::new(
				segments,
				*viewport,
				ContourQuality::Preview,
			));
		}

		entry.contour.as_ref()
	}

	/// Point literals with their equation's colour.
	pub fn points(&self) -> impl Iterator<Item = (EquationId, f64, f64, Rgb)> + '_ {
		self.equations.iter().filter_map(|(id, equation)| {
			let (x, y) = equation.model.point()?;
			Some((*id, x, y, equation.color))
		})
	}

	/// Snaps to, in order of preference, an intersection, an intercept, or the
	/// nearest explicit curve directly above or below the cursor.
	#[must_use]
	pub fn hover(&self, pixel_x: f64, pixel_y: f64) -> Option<Hover> {
		let (x, y) = self.viewport.to_equation(pixel_x, pixel_y);
		let threshold = self.config.snap_threshold_px / self.viewport.scale();

		let snapped = self
			.intersections
			.iter()
			.find(|point| point.distance(x, y) < threshold)
			.or_else(|| {
				self.intercepts
					.iter()
					.find(|point| point.distance(x, y) < threshold)
			});

		if let Some(point) = snapped {
			return Some(Hover {
				x: point.x,
				y: point.y,
				color: point.color,
				snappable: true,
			});
		}

		self.equations
			.values()
			.filter(|equation| equation.model.is_explicit())
			.filter_map(|equation| {
				let curve_y = equation.value_at(x);
				let distance = (curve_y - y).abs();

				(distance < threshold).then_some((distance, curve_y, equation.color))
			})
			.min_by(|a, b| a.0.total_cmp(&b.0))
			.map(|(_, curve_y, color)| Hover {
				x,
				y: curve_y,
				color,
				snappable: false,
			})
	}

	/// Pins or unpins whatever snappable point is under the cursor. Returns
	/// whether the point is pinned afterwards, or `None` if nothing snapped.
	pub fn click(&mut self, pixel_x: f64, pixel_y: f64) -> Option<bool> {
		let hover = self.hover(pixel_x, pixel_y).filter(|hover| hover.snappable)?;

		Some(self.toggle_pin(hover.x, hover.y))
	}

	/// Returns `true` if the point was pinned, `false` if an existing pin within
	/// [`PIN_TOLERANCE`] was removed instead.
	pub fn toggle_pin(&mut self, x: f64, y: f64) -> bool {
		let before = self.pins.len();
		self.pins
			.retain(|&(px, py)| (px - x).hypot(py - y) >= PIN_TOLERANCE);

		if self.pins.len() == before {
			self.pins.push((x, y));
			true
		} else {
			false
		}
	}

	#[must_use]
	pub fn pins(&self) -> &[(f64, f64)] {
		&self.pins
	}

	pub fn clear_pins(&mut self) {
		self.pins.clear();
	}

	/// Cancels running jobs and tears the worker pool down.
	pub fn shutdown(self) {
		let Self { jobs, executor, .. } = self;

		jobs.shutdown();
		drop(executor);

		debug!("scene shut down");
	}
}
