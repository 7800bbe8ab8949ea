use std::{num::NonZero, thread, time::Duration};

use serde::{Deserialize, Serialize};

/// Tuning knobs for every stage of the pipeline. Pixel quantities are
/// converted to equation units through the current scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PlotConfig {
	/// Edge length of a coarse preview cell.
	pub coarse_cell_px: f64,
	/// Edge length of a cell in the fine pass' outer lattice.
	pub fine_coarse_step_px: f64,
	/// Each straddling outer cell is split into this many cells per side.
	pub fine_subdivisions: usize,
	/// How much larger than the visible region the fine pass covers.
	pub fine_region_factor: f64,
	/// Fraction of the visible span the center may drift before a contour
	/// cache goes stale.
	pub cache_drift_tolerance: f64,
	/// Width of the explicit sample strip in visible widths.
	pub sample_buffer_factor: f64,
	pub samples_per_pixel: f64,
	pub root_scan_step_px: f64,
	pub snap_threshold_px: f64,
	pub parameter_debounce_ms: u64,
	pub edit_debounce_ms: u64,
	pub scroll_settle_ms: u64,
	pub zoom_factor: f64,
	pub default_scale: f64,
	pub linear_probe_x: f64,
	/// Zero picks the available parallelism.
	pub worker_threads: usize,
}

impl PlotConfig {
	#[must_use]
	pub const fn parameter_debounce(&self) -> Duration {
		Duration::from_millis(self.parameter_debounce_ms)
	}

	#[must_use]
	pub const fn edit_debounce(&self) -> Duration {
		Duration::from_millis(self.edit_debounce_ms)
	}

	#[must_use]
	pub const fn scroll_settle(&self) -> Duration {
		Duration::from_millis(self.scroll_settle_ms)
	}

	#[must_use]
	pub fn worker_threads(&self) -> usize {
		match self.worker_threads {
			0 => thread::available_parallelism().map_or(1, NonZero::get),
			n => n,
		}
	}
}

impl Default for PlotConfig {
	fn default() -> Self {
		Self {
			coarse_cell_px: 20.0,
			fine_coarse_step_px: 15.0,
			fine_subdivisions: 10,
			fine_region_factor: 1.2,
			cache_drift_tolerance: 0.1,
			sample_buffer_factor: 3.0,
			samples_per_pixel: 2.0,
			root_scan_step_px: 2.0,
			snap_threshold_px: 30.0,
			parameter_debounce_ms: 50,
			edit_debounce_ms: 300,
			scroll_settle_ms: 120,
			zoom_factor: 1.1,
			default_scale: 50.0,
			linear_probe_x: grapher_expr::LINEAR_PROBE_X,
			worker_threads: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::PlotConfig;

	#[test]
	fn partial_file_keeps_defaults() -> Result<(), toml::de::Error> {
		let config: PlotConfig = toml::from_str("snap_threshold_px = 12.5\nworker_threads = 3\n")?;

		assert_eq!(config.snap_threshold_px, 12.5);
		assert_eq!(config.worker_threads(), 3);
		assert_eq!(config.coarse_cell_px, 20.0);
		assert_eq!(config.parameter_debounce(), Duration::from_millis(50));

		Ok(())
	}

	#[test]
	fn zero_workers_means_all_cores() {
		assert!(PlotConfig::default().worker_threads() >= 1);
	}
}
