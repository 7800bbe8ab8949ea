use std::{
	f64::consts::{E, PI},
	fmt::{Display, Formatter, Result as FmtResult, Write as _},
	sync::Arc,
};

use crate::Parameter;

/// Tolerance used by `==` in relations.
pub const EQUALITY_TOLERANCE: f64 = 1e-9;

/// An immutable, thread-shareable expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
	Constant(f64),
	X,
	Y,
	Parameter(Arc<Parameter>),
	Neg(Box<Self>),
	Binary(BinaryOp, Box<Self>, Box<Self>),
	Compare(CompareOp, Box<Self>, Box<Self>),
	Logical(LogicalOp, Box<Self>, Box<Self>),
	Call(Function, Box<Self>),
}

impl Expr {
	#[must_use]
	pub const fn nan() -> Self {
		Self::Constant(f64::NAN)
	}

	#[must_use]
	pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
		Self::Binary(op, Box::new(lhs), Box::new(rhs))
	}

	#[must_use]
	pub fn compare(op: CompareOp, lhs: Self, rhs: Self) -> Self {
		Self::Compare(op, Box::new(lhs), Box::new(rhs))
	}

	#[must_use]
	pub fn logical(op: LogicalOp, lhs: Self, rhs: Self) -> Self {
		Self::Logical(op, Box::new(lhs), Box::new(rhs))
	}

	#[must_use]
	pub fn call(function: Function, arg: Self) -> Self {
		Self::Call(function, Box::new(arg))
	}

	#[allow(clippy::should_implement_trait)]
	#[must_use]
	pub fn neg(inner: Self) -> Self {
		Self::Neg(Box::new(inner))
	}

	/// Evaluates the tree at `(x, y)`. Never panics; failures surface as NaN
	/// or an infinity.
	#[must_use]
	pub fn eval(&self, x: f64, y: f64) -> f64 {
		match self {
			Self::Constant(value) => *value,
			Self::X => x,
			Self::Y => y,
			Self::Parameter(p) => p.get(),
			Self::Neg(inner) => -inner.eval(x, y),
			Self::Binary(op, lhs, rhs) => op.apply(lhs.eval(x, y), rhs.eval(x, y)),
			Self::Compare(op, lhs, rhs) => truth(op.apply(lhs.eval(x, y), rhs.eval(x, y))),
			Self::Logical(op, lhs, rhs) => {
				let lhs = lhs.eval(x, y) > 0.0;
				let rhs = || rhs.eval(x, y) > 0.0;

				truth(match op {
					LogicalOp::And => lhs && rhs(),
					LogicalOp::Or => lhs || rhs(),
				})
			}
			Self::Call(function, arg) => function.apply(arg.eval(x, y)),
		}
	}

	/// Whether the tree mentions the `y` coordinate anywhere.
	#[must_use]
	pub fn depends_on_y(&self) -> bool {
		match self {
			Self::Y => true,
			Self::Constant(..) | Self::X | Self::Parameter(..) => false,
			Self::Neg(inner) | Self::Call(_, inner) => inner.depends_on_y(),
			Self::Binary(_, lhs, rhs) | Self::Compare(_, lhs, rhs) | Self::Logical(_, lhs, rhs) => {
				lhs.depends_on_y() || rhs.depends_on_y()
			}
		}
	}
}

const fn truth(value: bool) -> f64 {
	if value { 1.0 } else { 0.0 }
}

impl Display for Expr {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Constant(value) if *value == PI => f.write_str("pi"),
			Self::Constant(value) if *value == E => f.write_char('e'),
			Self::Constant(value) => Display::fmt(value, f),
			Self::X => f.write_char('x'),
			Self::Y => f.write_char('y'),
			Self::Parameter(p) => f.write_char(p.name()),
			Self::Neg(inner) => write!(f, "-({inner})"),
			Self::Binary(op, lhs, rhs) => write!(f, "({lhs}{op}{rhs})"),
			Self::Compare(op, lhs, rhs) => write!(f, "({lhs}{op}{rhs})"),
			Self::Logical(op, lhs, rhs) => write!(f, "({lhs} {op} {rhs})"),
			Self::Call(function, arg) => write!(f, "{function}({arg})"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Add,
	Sub,
	Mul,
	Div,
	Pow,
}

impl BinaryOp {
	#[inline]
	#[must_use]
	pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
		match self {
			Self::Add => lhs + rhs,
			Self::Sub => lhs - rhs,
			Self::Mul => lhs * rhs,
			Self::Div => lhs / rhs,
			Self::Pow => lhs.powf(rhs),
		}
	}
}

impl Display for BinaryOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_char(match self {
			Self::Add => '+',
			Self::Sub => '-',
			Self::Mul => '*',
			Self::Div => '/',
			Self::Pow => '^',
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Less,
	LessEqual,
	Greater,
	GreaterEqual,
	Equal,
}

impl CompareOp {
	#[must_use]
	pub fn apply(self, lhs: f64, rhs: f64) -> bool {
		match self {
			Self::Less => lhs < rhs,
			Self::LessEqual => lhs <= rhs,
			Self::Greater => lhs > rhs,
			Self::GreaterEqual => lhs >= rhs,
			Self::Equal => (lhs - rhs).abs() < EQUALITY_TOLERANCE,
		}
	}
}

impl Display for CompareOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(match self {
			Self::Less => "<",
			Self::LessEqual => "<=",
			Self::Greater => ">",
			Self::GreaterEqual => ">=",
			Self::Equal => "==",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
	And,
	Or,
}

impl Display for LogicalOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(match self {
			Self::And => "&&",
			Self::Or => "||",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
	Sin,
	Cos,
	Tan,
	Asin,
	Acos,
	Atan,
	Sinh,
	Cosh,
	Tanh,
	Sqrt,
	Cbrt,
	Abs,
	Log,
	Ln,
	Exp,
	Floor,
	Ceil,
	Round,
	Sign,
}

impl Function {
	/// Every name erased from the text before parameter detection, longest
	/// spelling first so that prefixes never shadow a longer name.
	pub const STRIPPED_NAMES: &'static [&'static str] = &[
		"arcsin", "arccos", "arctan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "sin",
		"cos", "tan", "sqrt", "cbrt", "abs", "log", "ln", "exp", "floor", "ceil", "round",
		"signum", "sign", "pi",
	];

	#[must_use]
	pub fn from_name(name: &str) -> Option<Self> {
		Some(match name {
			"sin" => Self::Sin,
			"cos" => Self::Cos,
			"tan" => Self::Tan,
			"asin" | "arcsin" => Self::Asin,
			"acos" | "arccos" => Self::Acos,
			"atan" | "arctan" => Self::Atan,
			"sinh" => Self::Sinh,
			"cosh" => Self::Cosh,
			"tanh" => Self::Tanh,
			"sqrt" => Self::Sqrt,
			"cbrt" => Self::Cbrt,
			"abs" => Self::Abs,
			"log" => Self::Log,
			"ln" => Self::Ln,
			"exp" => Self::Exp,
			"floor" => Self::Floor,
			"ceil" => Self::Ceil,
			"round" => Self::Round,
			"sign" | "signum" => Self::Sign,
			_ => return None,
		})
	}

	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Sin => "sin",
			Self::Cos => "cos",
			Self::Tan => "tan",
			Self::Asin => "asin",
			Self::Acos => "acos",
			Self::Atan => "atan",
			Self::Sinh => "sinh",
			Self::Cosh => "cosh",
			Self::Tanh => "tanh",
			Self::Sqrt => "sqrt",
			Self::Cbrt => "cbrt",
			Self::Abs => "abs",
			Self::Log => "log",
			Self::Ln => "ln",
			Self::Exp => "exp",
			Self::Floor => "floor",
			Self::Ceil => "ceil",
			Self::Round => "round",
			Self::Sign => "sign",
		}
	}

	#[must_use]
	pub fn apply(self, v: f64) -> f64 {
		match self {
			Self::Sin => v.sin(),
			Self::Cos => v.cos(),
			Self::Tan => v.tan(),
			Self::Asin => v.asin(),
			Self::Acos => v.acos(),
			Self::Atan => v.atan(),
			Self::Sinh => v.sinh(),
			Self::Cosh => v.cosh(),
			Self::Tanh => v.tanh(),
			Self::Sqrt => v.sqrt(),
			Self::Cbrt => v.cbrt(),
			Self::Abs => v.abs(),
			Self::Log => v.log10(),
			Self::Ln => v.ln(),
			Self::Exp => v.exp(),
			Self::Floor => v.floor(),
			Self::Ceil => v.ceil(),
			// half-way values round towards positive infinity
			Self::Round => (v + 0.5).floor(),
			// zero and NaN map to themselves
			Self::Sign if v == 0.0 || v.is_nan() => v,
			Self::Sign => v.signum(),
		}
	}
}

impl Display for Function {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.name())
	}
}

#[cfg(test)]
mod tests {
	use super::Function;

	#[test]
	fn every_name_resolves() {
		for name in Function::STRIPPED_NAMES.iter().filter(|n| **n != "pi") {
			assert!(Function::from_name(name).is_some(), "{name}");
		}
	}

	#[test]
	fn round_and_sign_edges() {
		assert_eq!(Function::Round.apply(2.5), 3.0);
		assert_eq!(Function::Round.apply(-2.5), -2.0);
		assert_eq!(Function::Sign.apply(0.0), 0.0);
		assert_eq!(Function::Sign.apply(-3.0), -1.0);
		assert!(Function::Sign.apply(f64::NAN).is_nan());
	}

	#[test]
	fn domain_errors_are_nan_or_infinite() {
		assert!(Function::Asin.apply(2.0).is_nan());
		assert!(Function::Sqrt.apply(-1.0).is_nan());
		assert_eq!(Function::Log.apply(0.0), f64::NEG_INFINITY);
		assert!((Function::Log.apply(1000.0) - 3.0).abs() < 1e-12);
	}
}
