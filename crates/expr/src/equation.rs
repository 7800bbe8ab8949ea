use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{CompileError, Expr, Parameters, parser::Parser};

/// The `x` at which an implicit relation is probed for linearity in `y`.
pub const LINEAR_PROBE_X: f64 = 1.23;

const LINEARITY_TOLERANCE: f64 = 1e-9;
const MIN_SLOPE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Classification {
	/// `y = f(x)`.
	Explicit,
	/// `f(x, y) = g(x, y)`, contoured in two dimensions.
	Implicit,
	/// An implicit relation affine in `y`, solved for `y(x)`.
	LinearInY,
	/// A literal `(x, y)`.
	Point { x: f64, y: f64 },
}

impl Classification {
	#[must_use]
	pub const fn is_explicit(self) -> bool {
		matches!(self, Self::Explicit | Self::LinearInY)
	}

	#[must_use]
	pub const fn is_implicit(self) -> bool {
		matches!(self, Self::Implicit)
	}
}

/// One compiled equation. Immutable once built, so it can be shared with
/// evaluation threads; parameter cells are the only moving part.
#[derive(Debug)]
pub struct EquationModel {
	raw: String,
	classification: Classification,
	math: Expr,
	limit: Option<Expr>,
	parameters: Parameters,
	error: Option<CompileError>,
}

impl EquationModel {
	#[must_use]
	pub fn compile(text: &str) -> Self {
		Self::compile_with_probe(text, LINEAR_PROBE_X)
	}

	/// Never fails: malformed text produces an invalid model whose every
	/// evaluation is NaN.
	#[tracing::instrument(level = "debug", skip_all, fields(text = text))]
	#[must_use]
	pub fn compile_with_probe(text: &str, probe_x: f64) -> Self {
		if let Some((x, y)) = parse_point(text) {
			debug!("recognized point literal");

			return Self {
				raw: text.to_owned(),
				classification: Classification::Point { x, y },
				math: Expr::nan(),
				limit: None,
				parameters: Parameters::new(),
				error: None,
			};
		}

		let lower = text.to_lowercase();

		let form = match Form::split(&lower) {
			Ok(form) => form,
			Err(e) => return Self::invalid(text, Classification::Explicit, Parameters::new(), e),
		};

		let mut parameters = Parameters::new();
		parameters.detect(&form.body);
		if let Some(limit) = &form.limit {
			parameters.detect(limit);
		}

		let compiled = Parser::new(&form.body, &parameters)
			.and_then(Parser::parse)
			.and_then(|math| {
				let limit = form
					.limit
					.as_deref()
					.map(|limit| Parser::new(limit, &parameters).and_then(Parser::parse))
					.transpose()?;

				Ok((math, limit))
			});

		let (math, limit) = match compiled {
			Ok(parts) => parts,
			Err(e) => return Self::invalid(text, form.classification, parameters, e),
		};

		// a bare expression mentioning `y` is read as `expr = 0`
		let classification = if form.bare && math.depends_on_y() {
			Classification::Implicit
		} else {
			form.classification
		};

		let classification = if classification.is_implicit() && is_linear_in_y(&math, probe_x) {
			debug!("implicit relation is linear in y, promoting");
			Classification::LinearInY
		} else {
			classification
		};

		info!(
			"compiled {:?} equation with {} parameter(s)",
			classification,
			parameters.len()
		);

		Self {
			raw: text.to_owned(),
			classification,
			math,
			limit,
			parameters,
			error: None,
		}
	}

	fn invalid(
		text: &str,
		classification: Classification,
		parameters: Parameters,
		error: CompileError,
	) -> Self {
		debug!("falling back to NaN: {error}");

		Self {
			raw: text.to_owned(),
			classification,
			math: Expr::nan(),
			limit: None,
			parameters,
			error: Some(error),
		}
	}

	#[must_use]
	pub fn raw(&self) -> &str {
		&self.raw
	}

	#[must_use]
	pub const fn classification(&self) -> Classification {
		self.classification
	}

	#[must_use]
	pub const fn is_explicit(&self) -> bool {
		self.classification.is_explicit()
	}

	#[must_use]
	pub const fn is_implicit(&self) -> bool {
		self.classification.is_implicit()
	}

	#[must_use]
	pub const fn point(&self) -> Option<(f64, f64)> {
		match self.classification {
			Classification::Point { x, y } => Some((x, y)),
			_ => None,
		}
	}

	#[must_use]
	pub const fn is_valid(&self) -> bool {
		self.error.is_none()
	}

	#[must_use]
	pub const fn error(&self) -> Option<&CompileError> {
		self.error.as_ref()
	}

	#[must_use]
	pub const fn parameters(&self) -> &Parameters {
		&self.parameters
	}

	#[must_use]
	pub const fn math(&self) -> &Expr {
		&self.math
	}

	#[must_use]
	pub const fn limit(&self) -> Option<&Expr> {
		self.limit.as_ref()
	}

	/// `y` at `x` for explicit and promoted equations, NaN for anything else,
	/// outside the domain restriction, or on any arithmetic failure.
	#[must_use]
	pub fn eval_explicit(&self, x: f64) -> f64 {
		if !self.is_valid() {
			return f64::NAN;
		}

		let y = match self.classification {
			Classification::Explicit => self.math.eval(x, 0.0),
			Classification::LinearInY => {
				let f0 = self.math.eval(x, 0.0);
				let f1 = self.math.eval(x, 1.0);
				-f0 / (f1 - f0)
			}
			Classification::Implicit | Classification::Point { .. } => return f64::NAN,
		};

		if self.within_limit(x, y) { y } else { f64::NAN }
	}

	/// The signed field whose zero set is the curve. Explicit equations are
	/// read as `y - f(x)`.
	#[must_use]
	pub fn eval_implicit(&self, x: f64, y: f64) -> f64 {
		if !self.is_valid() || !self.within_limit(x, y) {
			return f64::NAN;
		}

		match self.classification {
			Classification::Implicit | Classification::LinearInY => self.math.eval(x, y),
			Classification::Explicit => y - self.math.eval(x, 0.0),
			Classification::Point { .. } => f64::NAN,
		}
	}

	fn within_limit(&self, x: f64, y: f64) -> bool {
		self.limit.as_ref().is_none_or(|limit| limit.eval(x, y) == 1.0)
	}
}

fn is_linear_in_y(math: &Expr, probe_x: f64) -> bool {
	let v0 = math.eval(probe_x, 0.0);
	let v1 = math.eval(probe_x, 1.0);
	let v2 = math.eval(probe_x, 2.0);

	if !(v0.is_finite() && v1.is_finite() && v2.is_finite()) {
		return false;
	}

	let d1 = v1 - v0;
	let d2 = v2 - v1;

	(d1 - d2).abs() < LINEARITY_TOLERANCE && d1.abs() > MIN_SLOPE
}

/// The text split into its curve body and optional domain restriction, with
/// `A = B` already rewritten to `(A)-(B)`.
#[derive(Debug, PartialEq)]
struct Form {
	classification: Classification,
	body: String,
	limit: Option<String>,
	/// Neither an explicit prefix nor any `=`.
	bare: bool,
}

impl Form {
	fn split(text: &str) -> Result<Self, CompileError> {
		let (math, limit) = match text.find('{') {
			Some(open) => {
				let close = text
					.rfind('}')
					.filter(|close| *close > open)
					.ok_or(CompileError::UnmatchedBrace)?;

				let tail = text[close + 1..].trim();
				if !tail.is_empty() {
					return Err(CompileError::unexpected_token(close + 1, tail.to_owned()));
				}

				let limit = text[open + 1..close]
					.trim()
					.replace("and", "&&")
					.replace(',', "&&");

				(text[..open].trim(), Some(limit).filter(|l| !l.is_empty()))
			}
			None => (text.trim(), None),
		};

		if math.is_empty() {
			return Err(CompileError::Empty);
		}

		if let Some(body) = explicit_body(math) {
			return Ok(Self {
				classification: Classification::Explicit,
				body: body.trim().to_owned(),
				limit,
				bare: false,
			});
		}

		let equals = bare_equals(math);

		let body = match *equals.as_slice() {
			[] => {
				return Ok(Self {
					classification: Classification::Explicit,
					body: math.to_owned(),
					limit,
					bare: true,
				});
			}
			[at] => format!("({})-({})", &math[..at], &math[at + 1..]),
			_ => math.to_owned(),
		};

		Ok(Self {
			classification: Classification::Implicit,
			body,
			limit,
			bare: false,
		})
	}
}

/// The right-hand side of `y = ...` or `f(x) = ...`.
fn explicit_body(math: &str) -> Option<&str> {
	let rest = math.trim_start();
	let rest = rest.strip_prefix("f(x)").or_else(|| rest.strip_prefix('y'))?;
	let rest = rest.trim_start().strip_prefix('=')?;

	if rest.starts_with('=') { None } else { Some(rest) }
}

/// Byte offsets of every `=` that is not part of `<=`, `>=` or `==`.
fn bare_equals(text: &str) -> Vec<usize> {
	let bytes = text.as_bytes();

	bytes
		.iter()
		.enumerate()
		.filter(|&(i, b)| {
			*b == b'='
				&& !matches!(i.checked_sub(1).map(|p| bytes[p]), Some(b'<' | b'>' | b'=' | b'!'))
				&& bytes.get(i + 1) != Some(&b'=')
		})
		.map(|(i, _)| i)
		.collect()
}

/// Recognizes `(x, y)` with plain decimal coordinates.
fn parse_point(text: &str) -> Option<(f64, f64)> {
	let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
	let (x, y) = inner.split_once(',')?;
	let (x, y) = (x.trim(), y.trim());

	if !(is_plain_decimal(x) && is_plain_decimal(y)) {
		return None;
	}

	Some((x.parse().ok()?, y.parse().ok()?))
}

fn is_plain_decimal(s: &str) -> bool {
	let digits = s.strip_prefix('-').unwrap_or(s);
	let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

	!whole.is_empty()
		&& whole.bytes().all(|b| b.is_ascii_digit())
		&& fraction.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
	use super::{Classification, EquationModel, Form, bare_equals, parse_point};
	use crate::CompileError;

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn constant_expression_ignores_x() {
		let model = EquationModel::compile("y = 3*2 + sqrt(16)");

		for x in [-100.0, -1.0, 0.0, 2.5, 1e6] {
			assert_eq!(model.eval_explicit(x), 10.0);
		}
	}

	#[test]
	fn explicit_parabola() {
		let model = EquationModel::compile("y=x^2");

		assert_eq!(model.classification(), Classification::Explicit);
		assert_eq!(model.eval_explicit(2.0), 4.0);
		assert_eq!(model.eval_explicit(-3.0), 9.0);
	}

	#[test]
	fn function_notation_is_explicit() {
		let model = EquationModel::compile("f(x) = 2x + 1");

		assert_eq!(model.classification(), Classification::Explicit);
		assert_eq!(model.eval_explicit(3.0), 7.0);
	}

	#[test]
	fn bare_expression_is_explicit() {
		let model = EquationModel::compile("x+1");

		assert!(model.is_explicit());
		assert_eq!(model.eval_explicit(1.0), 2.0);
	}

	#[test]
	fn bare_expression_with_y_is_a_zero_set() {
		let model = EquationModel::compile("x^2+y^2-1");

		assert_eq!(model.classification(), Classification::Implicit);
		assert!(close(model.eval_implicit(1.0, 0.0), 0.0));
	}

	#[test]
	fn circle_is_implicit() {
		let model = EquationModel::compile("x^2+y^2=9");

		assert_eq!(model.classification(), Classification::Implicit);
		assert!(close(model.eval_implicit(0.0, 3.0), 0.0));
		assert_eq!(model.eval_implicit(0.0, 0.0), -9.0);
		assert!(model.eval_explicit(0.0).is_nan());
	}

	#[test]
	fn linear_relation_is_promoted() {
		let model = EquationModel::compile("2*y-x=0");

		assert_eq!(model.classification(), Classification::LinearInY);
		assert!(model.is_explicit());
		assert!(close(model.eval_explicit(4.0), 2.0));
	}

	#[test]
	fn spaced_explicit_prefix_is_still_explicit() {
		let model = EquationModel::compile("y = x - 1");

		assert_eq!(model.classification(), Classification::Explicit);
		assert_eq!(model.eval_explicit(1.0), 0.0);
	}

	#[test]
	fn parameters_default_to_one() {
		let model = EquationModel::compile("a*sin(x)");
		let names = model.parameters().names().collect::<Vec<_>>();

		assert_eq!(names, ['a']);
		assert_eq!(model.parameters().get('a').unwrap().get(), 1.0);
	}

	#[test]
	fn parameter_writes_are_seen_by_evaluation() {
		let model = EquationModel::compile("y = m*x + c");

		model.parameters().get('m').unwrap().set(2.0);
		model.parameters().get('c').unwrap().set(-1.0);

		assert_eq!(model.eval_explicit(3.0), 5.0);
	}

	#[test]
	fn domain_restriction_masks_values() {
		let model = EquationModel::compile("y = x {0 < x < 2}");

		assert_eq!(model.eval_explicit(1.0), 1.0);
		assert!(model.eval_explicit(-1.0).is_nan());
		assert!(model.eval_explicit(3.0).is_nan());
	}

	#[test]
	fn domain_restriction_accepts_and_and_commas() {
		let a = EquationModel::compile("y = 1 {x > 0 and y > 0}");
		let b = EquationModel::compile("y = 1 {x > 0, x < 5}");

		assert_eq!(a.eval_explicit(1.0), 1.0);
		assert!(a.eval_explicit(-1.0).is_nan());
		assert_eq!(b.eval_explicit(4.0), 1.0);
		assert!(b.eval_explicit(6.0).is_nan());
	}

	#[test]
	fn domain_restriction_on_implicit_curve() {
		let model = EquationModel::compile("x^2+y^2=1 {y>0}");

		assert!(model.eval_implicit(0.0, 0.5).is_finite());
		assert!(model.eval_implicit(0.0, -0.5).is_nan());
	}

	#[test]
	fn point_literal_short_circuits() {
		let model = EquationModel::compile(" (1.5, -2) ");

		assert_eq!(model.point(), Some((1.5, -2.0)));
		assert!(model.is_valid());
		assert!(model.eval_explicit(0.0).is_nan());
	}

	#[test]
	fn malformed_text_degrades_to_nan() {
		let model = EquationModel::compile("y = sin(");

		assert!(!model.is_valid());
		assert!(model.eval_explicit(1.0).is_nan());
		assert!(model.eval_implicit(1.0, 1.0).is_nan());
	}

	#[test]
	fn unknown_function_is_reported() {
		let model = EquationModel::compile("y = blah(x)");

		assert_eq!(
			model.error(),
			Some(&CompileError::UnknownFunction("blah".to_owned()))
		);
	}

	#[test]
	fn unmatched_brace_is_reported() {
		let model = EquationModel::compile("y = x {x > 0");

		assert_eq!(model.error(), Some(&CompileError::UnmatchedBrace));
	}

	#[test]
	fn division_by_zero_follows_ieee() {
		let model = EquationModel::compile("y = 1/x");

		assert_eq!(model.eval_explicit(0.0), f64::INFINITY);
		assert!(EquationModel::compile("y = 0/x").eval_explicit(0.0).is_nan());
	}

	#[test]
	fn uppercase_input_is_folded() {
		let model = EquationModel::compile("Y = SIN(X)");

		assert!(model.is_valid());
		assert!(close(model.eval_explicit(0.0), 0.0));
	}

	#[test]
	fn rewrites_single_equals_only() {
		assert_eq!(bare_equals("x<=y"), Vec::<usize>::new());
		assert_eq!(bare_equals("x=y"), [1]);
		assert_eq!(bare_equals("x==y"), Vec::<usize>::new());

		let form = Form::split("x^2 = y").unwrap();
		assert_eq!(form.classification, Classification::Implicit);
		assert_eq!(form.body, "(x^2 )-( y)");
	}

	#[test]
	fn repeated_decimal_point_is_malformed() {
		let model = EquationModel::compile("y = 1.2.3");

		assert!(!model.is_valid());
		assert!(matches!(model.error(), Some(CompileError::InvalidNumber(_))));
		assert!(model.eval_explicit(1.0).is_nan());
	}

	#[test]
	fn text_after_domain_restriction_is_rejected() {
		let model = EquationModel::compile("y = x {x > 0} + 5");

		assert!(!model.is_valid());
		assert!(matches!(
			model.error(),
			Some(CompileError::UnexpectedToken(_, tail)) if tail == "+ 5"
		));
		assert!(EquationModel::compile("y = x {x > 0}  ").is_valid());
	}

	#[test]
	fn comma_outside_domain_restriction_is_rejected() {
		let model = EquationModel::compile("y = x, 2");

		assert!(!model.is_valid());
		assert!(matches!(
			model.error(),
			Some(CompileError::UnexpectedCharacter(_, ','))
		));
	}

	#[test]
	fn point_pattern_is_strict() {
		assert_eq!(parse_point("(3, 4)"), Some((3.0, 4.0)));
		assert_eq!(parse_point("(-3.5,0.)"), Some((-3.5, 0.0)));
		assert_eq!(parse_point("(x, 4)"), None);
		assert_eq!(parse_point("(1e3, 4)"), None);
		assert_eq!(parse_point("3, 4"), None);
	}
}
