use std::{
	num::ParseFloatError,
	path::{Path, PathBuf},
	str::FromStr,
};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
	/// Equations to plot, one per line.
	pub file_path: PathBuf,
	/// Where the RON scene snapshot goes. Defaults to stdout.
	#[arg(short, long = "output")]
	pub output_path: Option<PathBuf>,
	/// TOML file overriding the plot tuning.
	#[arg(short, long = "config")]
	pub config_path: Option<PathBuf>,
	#[arg(long, default_value_t = 800.0)]
	pub width: f64,
	#[arg(long, default_value_t = 600.0)]
	pub height: f64,
	#[arg(short = 'x', long, default_value_t = 0.0, allow_negative_numbers = true)]
	pub center_x: f64,
	#[arg(short = 'y', long, default_value_t = 0.0, allow_negative_numbers = true)]
	pub center_y: f64,
	/// Pixels per unit. Falls back to the configured default scale.
	#[arg(short, long)]
	pub scale: Option<f64>,
	/// Parameter value applied to every equation that uses it, as `a=2`.
	#[arg(short, long = "param", allow_negative_numbers = true)]
	pub params: Vec<ParamArg>,
	/// Directory for the JSON span log.
	#[arg(short, long)]
	pub log_dir: Option<PathBuf>,
}

impl Args {
	pub fn file_path(&self) -> &Path {
		&self.file_path
	}

	pub fn output_path(&self) -> Option<&Path> {
		self.output_path.as_deref()
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamArg {
	pub name: char,
	pub value: f64,
}

impl FromStr for ParamArg {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (name, value) = s
			.split_once('=')
			.ok_or_else(|| format!("expected `name=value`, found `{s}`"))?;

		let mut chars = name.trim().chars();
		let name = match (chars.next(), chars.next()) {
			(Some(c), None) if c.is_ascii_lowercase() => c,
			_ => return Err(format!("`{name}` is not a single-letter parameter")),
		};

		let value = value
			.trim()
			.parse()
			.map_err(|e: ParseFloatError| e.to_string())?;

		Ok(Self { name, value })
	}
}

#[cfg(test)]
mod tests {
	use super::ParamArg;

	#[test]
	fn parses_param_pairs() {
		assert_eq!(
			"a=-2.5".parse::<ParamArg>(),
			Ok(ParamArg {
				name: 'a',
				value: -2.5
			})
		);
		assert!("ab=1".parse::<ParamArg>().is_err());
		assert!("a".parse::<ParamArg>().is_err());
		assert!("a=one".parse::<ParamArg>().is_err());
	}
}
