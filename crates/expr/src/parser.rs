use std::f64::consts::{E, PI};

use logos::Logos as _;
use tracing::trace;

use crate::{
	BinaryOp, CompareOp, CompileError, Expr, Function, LogicalOp, Parameters, token::Token,
};

/// Recursive-descent parser. Precedence from loosest to tightest: logical,
/// relational, additive, multiplicative, unary sign, power, primary.
pub struct Parser<'source, 'params> {
	tokens: Vec<(Token<'source>, usize)>,
	pos: usize,
	parameters: &'params Parameters,
}

impl<'source, 'params> Parser<'source, 'params> {
	pub fn new(source: &'source str, parameters: &'params Parameters) -> Result<Self, CompileError> {
		let mut tokens = Vec::new();

		for (token, span) in Token::lexer(source).spanned() {
			let start = span.start;
			match token {
				Ok(token) => tokens.push((token, start)),
				Err(()) => {
					let c = source[start..].chars().next().unwrap_or_default();

					return Err(if c.is_ascii_digit() || c == '.' {
						CompileError::InvalidNumber(start)
					} else {
						CompileError::UnexpectedCharacter(start, c)
					});
				}
			}
		}

		trace!("lexed {} tokens", tokens.len());

		Ok(Self {
			tokens,
			pos: 0,
			parameters,
		})
	}

	pub fn parse(mut self) -> Result<Expr, CompileError> {
		if self.tokens.is_empty() {
			return Err(CompileError::Empty);
		}

		let expr = self.logical()?;

		match self.tokens.get(self.pos) {
			None => Ok(expr),
			Some((token, position)) => Err(CompileError::unexpected_token(
				*position,
				token.to_string(),
			)),
		}
	}

	fn peek(&self) -> Option<Token<'source>> {
		self.tokens.get(self.pos).map(|(token, _)| *token)
	}

	fn position(&self) -> usize {
		self.tokens.get(self.pos).map_or(usize::MAX, |(_, position)| *position)
	}

	fn advance(&mut self) -> Option<Token<'source>> {
		let token = self.peek();
		self.pos += 1;
		token
	}

	fn logical(&mut self) -> Result<Expr, CompileError> {
		let mut lhs = self.relational()?;

		loop {
			let op = match self.peek() {
				Some(Token::And) => LogicalOp::And,
				Some(Token::Or) => LogicalOp::Or,
				_ => return Ok(lhs),
			};

			self.advance();
			let rhs = self.relational()?;
			lhs = Expr::logical(op, lhs, rhs);
		}
	}

	/// `a < b < c` becomes `a < b && b < c`.
	fn relational(&mut self) -> Result<Expr, CompileError> {
		let mut lhs = self.additive()?;
		let mut chain: Option<Expr> = None;

		while let Some(op) = self.peek().and_then(compare_op) {
			self.advance();

			let rhs = self.additive()?;
			let link = Expr::compare(op, lhs, rhs.clone());

			chain = Some(match chain {
				Some(prev) => Expr::logical(LogicalOp::And, prev, link),
				None => link,
			});

			lhs = rhs;
		}

		Ok(chain.unwrap_or(lhs))
	}

	fn additive(&mut self) -> Result<Expr, CompileError> {
		let mut lhs = self.multiplicative()?;

		loop {
			let op = match self.peek() {
				Some(Token::Plus) => BinaryOp::Add,
				Some(Token::Minus) => BinaryOp::Sub,
				_ => return Ok(lhs),
			};

			self.advance();
			let rhs = self.multiplicative()?;
			lhs = Expr::binary(op, lhs, rhs);
		}
	}

	fn multiplicative(&mut self) -> Result<Expr, CompileError> {
		let mut lhs = self.unary()?;

		loop {
			let op = match self.peek() {
				Some(Token::Star) => {
					self.advance();
					BinaryOp::Mul
				}
				Some(Token::Slash) => {
					self.advance();
					BinaryOp::Div
				}
				// juxtaposition, as in `2x` or `3(x+1)`
				Some(Token::Number(..) | Token::Ident(..) | Token::Pi | Token::LeftParen) => {
					BinaryOp::Mul
				}
				_ => return Ok(lhs),
			};

			let rhs = self.unary()?;
			lhs = Expr::binary(op, lhs, rhs);
		}
	}

	fn unary(&mut self) -> Result<Expr, CompileError> {
		match self.peek() {
			Some(Token::Plus) => {
				self.advance();
				self.unary()
			}
			Some(Token::Minus) => {
				self.advance();
				Ok(Expr::neg(self.unary()?))
			}
			_ => self.power(),
		}
	}

	/// The exponent is parsed at unary level, which makes `^` right-associative
	/// and lets `2^-x` through.
	fn power(&mut self) -> Result<Expr, CompileError> {
		let base = self.primary()?;

		if matches!(self.peek(), Some(Token::Caret)) {
			self.advance();
			let exponent = self.unary()?;
			return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
		}

		Ok(base)
	}

	fn primary(&mut self) -> Result<Expr, CompileError> {
		let position = self.position();

		match self.advance() {
			None => Err(CompileError::UnexpectedEnd),
			Some(Token::Number(value)) => Ok(Expr::Constant(value)),
			Some(Token::Pi) => Ok(Expr::Constant(PI)),
			Some(Token::LeftParen) => {
				let inner = self.logical()?;
				self.close_paren(position)?;
				Ok(inner)
			}
			Some(Token::Ident(name)) if matches!(self.peek(), Some(Token::LeftParen)) => {
				let function = Function::from_name(name)
					.ok_or_else(|| CompileError::UnknownFunction(name.to_owned()))?;

				let open = self.position();
				self.advance();
				let arg = self.logical()?;
				self.close_paren(open)?;

				Ok(Expr::call(function, arg))
			}
			Some(Token::Ident(name)) => Ok(self.identifier(name)),
			Some(token) => Err(CompileError::unexpected_token(position, token.to_string())),
		}
	}

	fn close_paren(&mut self, open: usize) -> Result<(), CompileError> {
		match self.peek() {
			Some(Token::RightParen) => {
				self.advance();
				Ok(())
			}
			_ => Err(CompileError::UnmatchedParenthesis(open)),
		}
	}

	fn identifier(&self, name: &str) -> Expr {
		match name {
			"pi" => return Expr::Constant(PI),
			"e" => return Expr::Constant(E),
			_ => {}
		}

		// `ax` reads as `a*x`; letters that mean nothing become 1
		name.chars()
			.map(|c| self.letter(c))
			.reduce(|lhs, rhs| Expr::binary(BinaryOp::Mul, lhs, rhs))
			.unwrap_or(Expr::Constant(1.0))
	}

	fn letter(&self, c: char) -> Expr {
		match c {
			'x' => Expr::X,
			'y' => Expr::Y,
			c => self
				.parameters
				.get(c)
				.map_or(Expr::Constant(1.0), |p| Expr::Parameter(p.clone())),
		}
	}

	#[cfg(test)]
	fn remaining(&self) -> usize {
		self.tokens.len() - self.pos.min(self.tokens.len())
	}
}

const fn compare_op(token: Token<'_>) -> Option<CompareOp> {
	Some(match token {
		Token::Less => CompareOp::Less,
		Token::LessEqual => CompareOp::LessEqual,
		Token::Greater => CompareOp::Greater,
		Token::GreaterEqual => CompareOp::GreaterEqual,
		Token::Equal => CompareOp::Equal,
		_ => return None,
	})
}
