use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Rgb {
	pub const BLACK: Self = Self::new(0, 0, 0);
	pub const BLUE: Self = Self::new(0, 0, 255);
	pub const GREEN: Self = Self::new(0, 128, 0);
	pub const LIGHT_GRAY: Self = Self::new(211, 211, 211);
	pub const ORANGE: Self = Self::new(255, 165, 0);
	pub const PURPLE: Self = Self::new(128, 0, 128);
	pub const RED: Self = Self::new(255, 0, 0);
	pub const YELLOW: Self = Self::new(255, 255, 0);

	#[must_use]
	pub const fn new(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}
}

impl Display for Rgb {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}
}

/// Hands out equation colours in a fixed rotation.
#[derive(Debug, Default, Clone)]
pub struct Palette {
	next: usize,
}

impl Palette {
	pub const COLORS: [Rgb; 6] = [
		Rgb::RED,
		Rgb::BLUE,
		Rgb::GREEN,
		Rgb::ORANGE,
		Rgb::PURPLE,
		Rgb::BLACK,
	];

	#[must_use]
	pub const fn new() -> Self {
		Self { next: 0 }
	}

	pub const fn next_color(&mut self) -> Rgb {
		let color = Self::COLORS[self.next % Self::COLORS.len()];
		self.next = self.next.wrapping_add(1);
		color
	}

	pub const fn reset(&mut self) {
		self.next = 0;
	}
}
