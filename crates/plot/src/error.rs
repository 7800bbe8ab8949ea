use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult, Write as _},
	io::Error as IoError,
};

use rayon::ThreadPoolBuildError;

use crate::EquationId;

#[derive(Debug)]
pub enum SceneError {
	Io(IoError),
	ThreadPool(ThreadPoolBuildError),
	UnknownEquation(EquationId),
	UnknownParameter(EquationId, char),
	InvalidRange { min: f64, max: f64 },
}

impl Display for SceneError {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Io(..) => f.write_str("an IO error has occurred"),
			Self::ThreadPool(..) => f.write_str("unable to start the contour worker pool"),
			Self::UnknownEquation(id) => {
				f.write_str("no equation with id ")?;
				Display::fmt(id, f)
			}
			Self::UnknownParameter(id, name) => {
				f.write_str("equation ")?;
				Display::fmt(id, f)?;
				f.write_str(" has no parameter '")?;
				f.write_char(*name)?;
				f.write_char('\'')
			}
			Self::InvalidRange { min, max } => {
				f.write_str("invalid parameter range [")?;
				Display::fmt(min, f)?;
				f.write_str(", ")?;
				Display::fmt(max, f)?;
				f.write_str("], min must be below max")
			}
		}
	}
}

impl StdError for SceneError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			Self::ThreadPool(e) => Some(e),
			Self::UnknownEquation(..) | Self::UnknownParameter(..) | Self::InvalidRange { .. } => {
				None
			}
		}
	}
}

impl From<IoError> for SceneError {
	fn from(value: IoError) -> Self {
		Self::Io(value)
	}
}

impl From<ThreadPoolBuildError> for SceneError {
	fn from(value: ThreadPoolBuildError) -> Self {
		Self::ThreadPool(value)
	}
}
