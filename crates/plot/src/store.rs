use std::{
	fs,
	io::{self, Write},
	path::Path,
};

use tracing::info;

use crate::{Scene, SceneError};

impl Scene {
	/// Writes the raw text of every equation, one per line, in insertion order.
	pub fn write_equations(&self, mut output: impl Write) -> io::Result<()> {
		for text in self.texts() {
			output.write_all(text.replace(['\r', '\n'], " ").as_bytes())?;
			output.write_all(b"\n")?;
		}

		output.flush()
	}

	pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
		let path = path.as_ref();
		let mut output = Vec::new();
		self.write_equations(&mut output)?;

		fs::write(path, output)?;

		info!("saved {} equations to {}", self.len(), path.display());

		Ok(())
	}

	/// Replaces the scene with the equations in `source`, skipping blank lines.
	pub fn load_str(&mut self, source: &str) -> usize {
		self.clear();

		source
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty())
			.map(|line| self.add_equation(line))
			.count()
	}

	pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, SceneError> {
		let path = path.as_ref();
		let source = fs::read_to_string(path)?;
		let count = self.load_str(&source);

		info!("loaded {count} equations from {}", path.display());

		Ok(count)
	}
}
