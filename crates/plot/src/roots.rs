use serde::{Deserialize, Serialize};

use crate::Rgb;

pub const INTERCEPT_COLOR: Rgb = Rgb::LIGHT_GRAY;
pub const INTERSECTION_COLOR: Rgb = Rgb::YELLOW;

/// Roots closer than this fraction of the scan step are reported once.
const DUPLICATE_ROOT_FRACTION: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
	pub x: f64,
	pub y: f64,
	pub color: Rgb,
}

impl DerivedPoint {
	#[must_use]
	pub const fn new(x: f64, y: f64, color: Rgb) -> Self {
		Self { x, y, color }
	}

	#[must_use]
	pub fn distance(&self, x: f64, y: f64) -> f64 {
		(self.x - x).hypot(self.y - y)
	}
}

/// Every `x` in `[min, max]` where `f` changes sign between two neighbouring
/// samples `step` apart, placed by linear interpolation. Undefined samples
/// break the scan.
#[must_use]
pub fn sign_changes(min: f64, max: f64, step: f64, f: impl Fn(f64) -> f64) -> Vec<f64> {
	let mut roots = Vec::new();

	if !(step.is_finite() && step > 0.0 && min.is_finite() && max >= min) {
		return roots;
	}

	let count = ((max - min) / step).floor() as usize;
	let mut prev_x = min;
	let mut prev = f(min);

	for i in 1..=count {
		let x = (i as f64).mul_add(step, min);
		let value = f(x);

		if value.is_finite() && prev.is_finite() && prev * value <= 0.0 && !(prev == 0.0 && value == 0.0) {
			let t = prev.abs() / (prev.abs() + value.abs());
			let root = t.mul_add(x - prev_x, prev_x);

			// an exact zero sample closes one pair and opens the next
			if roots
				.last()
				.is_none_or(|&last| (root - last).abs() > step * DUPLICATE_ROOT_FRACTION)
			{
				roots.push(root);
			}
		}

		prev_x = x;
		prev = value;
	}

	roots
}

/// The curve's value at `x = 0`, if the y axis is in view and it is defined
/// there.
#[must_use]
pub fn y_intercept(min: f64, max: f64, f: impl Fn(f64) -> f64) -> Option<DerivedPoint> {
	if !(min <= 0.0 && max >= 0.0) {
		return None;
	}

	let y = f(0.0);
	y.is_finite().then(|| DerivedPoint::new(0.0, y, INTERCEPT_COLOR))
}

#[must_use]
pub fn x_intercepts(min: f64, max: f64, step: f64, f: impl Fn(f64) -> f64) -> Vec<DerivedPoint> {
	sign_changes(min, max, step, f)
		.into_iter()
		.map(|x| DerivedPoint::new(x, 0.0, INTERCEPT_COLOR))
		.collect()
}

/// Where two curves cross, found as sign changes of their difference.
#[must_use]
pub fn intersections(
	min: f64,
	max: f64,
	step: f64,
	f: impl Fn(f64) -> f64,
	g: impl Fn(f64) -> f64,
) -> Vec<DerivedPoint> {
	sign_changes(min, max, step, |x| f(x) - g(x))
		.into_iter()
		.filter_map(|x| {
			let y = f(x);
			y.is_finite()
				.then(|| DerivedPoint::new(x, y, INTERSECTION_COLOR))
		})
		.collect()
}
