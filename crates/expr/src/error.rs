use std::{
	borrow::Cow,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult, Write as _},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
	Empty,
	UnexpectedCharacter(usize, char),
	UnexpectedToken(usize, Cow<'static, str>),
	UnexpectedEnd,
	UnknownFunction(String),
	UnmatchedParenthesis(usize),
	UnmatchedBrace,
	InvalidNumber(usize),
}

impl CompileError {
	pub(crate) fn unexpected_token(position: usize, token: impl Into<Cow<'static, str>>) -> Self {
		Self::UnexpectedToken(position, token.into())
	}
}

impl Display for CompileError {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Empty => f.write_str("equation is empty"),
			Self::UnexpectedCharacter(position, c) => {
				f.write_str("unexpected character '")?;
				f.write_char(*c)?;
				f.write_str("' at #")?;
				Display::fmt(position, f)
			}
			Self::UnexpectedToken(position, token) => {
				f.write_str("unexpected \"")?;
				f.write_str(token)?;
				f.write_str("\" at #")?;
				Display::fmt(position, f)
			}
			Self::UnexpectedEnd => f.write_str("equation ended unexpectedly"),
			Self::UnknownFunction(name) => {
				f.write_str("unknown function \"")?;
				f.write_str(name)?;
				f.write_char('"')
			}
			Self::UnmatchedParenthesis(position) => {
				f.write_str("parenthesis opened at #")?;
				Display::fmt(position, f)?;
				f.write_str(" is never closed")
			}
			Self::UnmatchedBrace => f.write_str("domain restriction is missing its closing brace"),
			Self::InvalidNumber(position) => {
				f.write_str("malformed number at #")?;
				Display::fmt(position, f)
			}
		}
	}
}

impl StdError for CompileError {}
