use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 1e-2;
pub const MAX_SCALE: f64 = 1e5;

/// Pixels per equation unit on screen, plus where the screen center sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
	pub center_x: f64,
	pub center_y: f64,
	scale: f64,
}

impl ViewTransform {
	#[must_use]
	pub fn new(center_x: f64, center_y: f64, scale: f64) -> Self {
		Self {
			center_x,
			center_y,
			scale: clamp_scale(scale),
		}
	}

	#[must_use]
	pub const fn scale(self) -> f64 {
		self.scale
	}

	pub fn set_scale(&mut self, scale: f64) {
		self.scale = clamp_scale(scale);
	}
}

fn clamp_scale(scale: f64) -> f64 {
	if scale.is_nan() {
		return MIN_SCALE;
	}

	scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// A [`ViewTransform`] bound to the pixel extent of the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
	transform: ViewTransform,
	width: f64,
	height: f64,
}

impl Viewport {
	#[must_use]
	pub fn new(width: f64, height: f64, scale: f64) -> Self {
		Self {
			transform: ViewTransform::new(0.0, 0.0, scale),
			width,
			height,
		}
	}

	#[must_use]
	pub const fn transform(&self) -> ViewTransform {
		self.transform
	}

	pub const fn set_transform(&mut self, transform: ViewTransform) {
		self.transform = transform;
	}

	#[must_use]
	pub const fn width(&self) -> f64 {
		self.width
	}

	#[must_use]
	pub const fn height(&self) -> f64 {
		self.height
	}

	#[must_use]
	pub const fn scale(&self) -> f64 {
		self.transform.scale
	}

	pub const fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	#[must_use]
	pub fn to_equation(&self, pixel_x: f64, pixel_y: f64) -> (f64, f64) {
		let t = self.transform;

		(
			t.center_x + (pixel_x - self.width / 2.0) / t.scale,
			t.center_y + (self.height / 2.0 - pixel_y) / t.scale,
		)
	}

	#[must_use]
	pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
		let t = self.transform;

		(
			(x - t.center_x).mul_add(t.scale, self.width / 2.0),
			(t.center_y - y).mul_add(t.scale, self.height / 2.0),
		)
	}

	#[must_use]
	pub fn visible_x_range(&self) -> (f64, f64) {
		let half = self.width / 2.0 / self.transform.scale;
		(self.transform.center_x - half, self.transform.center_x + half)
	}

	#[must_use]
	pub fn visible_y_range(&self) -> (f64, f64) {
		let half = self.height / 2.0 / self.transform.scale;
		(self.transform.center_y - half, self.transform.center_y + half)
	}

	/// Drags the plane along with the cursor.
	pub fn pan_pixels(&mut self, dx: f64, dy: f64) {
		self.transform.center_x -= dx / self.transform.scale;
		self.transform.center_y += dy / self.transform.scale;
	}

	/// Zooms by `factor` while keeping the point under the cursor in place.
	pub fn zoom_at(&mut self, pixel_x: f64, pixel_y: f64, zoom_in: bool, factor: f64) {
		let (x, y) = self.to_equation(pixel_x, pixel_y);

		let scale = if zoom_in {
			self.transform.scale * factor
		} else {
			self.transform.scale / factor
		};
		self.transform.set_scale(scale);

		let scale = self.transform.scale;
		self.transform.center_x = x - (pixel_x - self.width / 2.0) / scale;
		self.transform.center_y = y - (self.height / 2.0 - pixel_y) / scale;
	}

	pub fn zoom_in(&mut self, factor: f64) {
		self.transform.set_scale(self.transform.scale * factor);
	}

	pub fn zoom_out(&mut self, factor: f64) {
		self.transform.set_scale(self.transform.scale / factor);
	}

	pub fn reset(&mut self, scale: f64) {
		self.transform = ViewTransform::new(0.0, 0.0, scale);
	}
}

/// Major and minor grid spacing in equation units for roughly one major line
/// every hundred pixels.
#[must_use]
pub fn grid_steps(scale: f64) -> (f64, f64) {
	const TARGET_PIXELS: f64 = 100.0;

	let raw = TARGET_PIXELS / scale;
	let magnitude = 10f64.powf(raw.log10().floor());
	let fraction = raw / magnitude;

	let major = if fraction < 2.0 {
		magnitude
	} else if fraction < 5.0 {
		2.0 * magnitude
	} else {
		5.0 * magnitude
	};

	(major, major / 5.0)
}
