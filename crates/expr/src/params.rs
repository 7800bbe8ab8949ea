use std::{
	collections::BTreeMap,
	fmt::{Debug, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use serde::{Deserialize, Serialize};

use crate::Function;

pub const DEFAULT_PARAMETER_VALUE: f64 = 1.0;

pub const DEFAULT_PARAMETER_RANGE: ParameterRange = ParameterRange {
	min: -10.0,
	max: 10.0,
};

/// A slider-controlled constant. Written by one collaborator while any number
/// of evaluator threads read it.
pub struct Parameter {
	name: char,
	value: AtomicU64,
	min: AtomicU64,
	max: AtomicU64,
}

impl Parameter {
	#[must_use]
	pub fn new(name: char) -> Self {
		Self {
			name,
			value: AtomicU64::new(DEFAULT_PARAMETER_VALUE.to_bits()),
			min: AtomicU64::new(DEFAULT_PARAMETER_RANGE.min.to_bits()),
			max: AtomicU64::new(DEFAULT_PARAMETER_RANGE.max.to_bits()),
		}
	}

	#[must_use]
	pub const fn name(&self) -> char {
		self.name
	}

	#[inline]
	#[must_use]
	pub fn get(&self) -> f64 {
		f64::from_bits(self.value.load(Ordering::Acquire))
	}

	pub fn set(&self, value: f64) {
		self.value.store(value.to_bits(), Ordering::Release);
	}

	#[must_use]
	pub fn range(&self) -> ParameterRange {
		ParameterRange {
			min: f64::from_bits(self.min.load(Ordering::Acquire)),
			max: f64::from_bits(self.max.load(Ordering::Acquire)),
		}
	}

	/// Returns `false` and leaves the range untouched unless `min < max`.
	pub fn set_range(&self, range: ParameterRange) -> bool {
		if range.min.partial_cmp(&range.max) != Some(core::cmp::Ordering::Less) {
			return false;
		}

		self.min.store(range.min.to_bits(), Ordering::Release);
		self.max.store(range.max.to_bits(), Ordering::Release);

		true
	}

	#[must_use]
	pub fn info(&self) -> ParameterInfo {
		ParameterInfo {
			name: self.name,
			value: self.get(),
			range: self.range(),
		}
	}
}

impl Debug for Parameter {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Parameter")
			.field("name", &self.name)
			.field("value", &self.get())
			.field("range", &self.range())
			.finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
	pub min: f64,
	pub max: f64,
}

impl Default for ParameterRange {
	fn default() -> Self {
		DEFAULT_PARAMETER_RANGE
	}
}

/// What the slider collaborator needs to render one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
	pub name: char,
	pub value: f64,
	pub range: ParameterRange,
}

/// The parameter cells of one equation, ordered by name.
#[derive(Debug, Default, Clone)]
pub struct Parameters {
	cells: BTreeMap<char, Arc<Parameter>>,
}

impl Parameters {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			cells: BTreeMap::new(),
		}
	}

	/// Registers every letter of `text` that is not `x`, `y`, `e` or part of a
	/// known function name. `text` is expected to be lower-cased already.
	pub fn detect(&mut self, text: &str) {
		let mut rest = text;

		while let Some(c) = rest.chars().next() {
			if let Some(name) = Function::STRIPPED_NAMES
				.iter()
				.find(|name| rest.starts_with(**name))
			{
				rest = &rest[name.len()..];
				continue;
			}

			if c.is_ascii_lowercase() && !matches!(c, 'x' | 'y' | 'e') {
				self.cells
					.entry(c)
					.or_insert_with(|| Arc::new(Parameter::new(c)));
			}

			rest = &rest[c.len_utf8()..];
		}
	}

	#[must_use]
	pub fn get(&self, name: char) -> Option<&Arc<Parameter>> {
		self.cells.get(&name)
	}

	#[must_use]
	pub fn contains(&self, name: char) -> bool {
		self.cells.contains_key(&name)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.cells.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.cells.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<Parameter>> {
		self.cells.values()
	}

	pub fn names(&self) -> impl Iterator<Item = char> + '_ {
		self.cells.keys().copied()
	}

	#[must_use]
	pub fn infos(&self) -> Vec<ParameterInfo> {
		self.iter().map(|p| p.info()).collect()
	}

	/// Copies value and range of every same-named parameter in `previous`.
	pub fn inherit(&self, previous: &Self) {
		for (name, cell) in &self.cells {
			if let Some(old) = previous.cells.get(name) {
				cell.set(old.get());
				cell.set_range(old.range());
			}
		}
	}
}
