use std::fmt::{Display, Formatter, Result as FmtResult};

use logos::Logos;

/// This is here so we don't leak the [`Logos`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Logos)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token<'source> {
	#[token("+")]
	Plus,
	#[token("-")]
	Minus,
	#[token("*")]
	#[token("⋅")]
	#[token("·")]
	#[token("×")]
	Star,
	#[token("/")]
	Slash,
	#[token("^")]
	Caret,
	#[token("(")]
	LeftParen,
	#[token(")")]
	RightParen,
	#[token("<")]
	Less,
	#[token("<=")]
	#[token("≤")]
	LessEqual,
	#[token(">")]
	Greater,
	#[token(">=")]
	#[token("≥")]
	GreaterEqual,
	#[token("=")]
	#[token("==")]
	Equal,
	#[token("&&")]
	And,
	#[token("||")]
	Or,
	#[token("π")]
	Pi,
	/// Digits and dots are taken as one run, so `1.2.3` fails here instead of
	/// splitting into a product.
	#[regex(r"[0-9.]+", |lex| lex.slice().parse::<f64>().ok())]
	Number(f64),
	#[regex("[a-zA-Z]+", |lex| lex.slice())]
	Ident(&'source str),
}

impl Display for Token<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match *self {
			Self::Plus => f.write_str("+"),
			Self::Minus => f.write_str("-"),
			Self::Star => f.write_str("*"),
			Self::Slash => f.write_str("/"),
			Self::Caret => f.write_str("^"),
			Self::LeftParen => f.write_str("("),
			Self::RightParen => f.write_str(")"),
			Self::Less => f.write_str("<"),
			Self::LessEqual => f.write_str("<="),
			Self::Greater => f.write_str(">"),
			Self::GreaterEqual => f.write_str(">="),
			Self::Equal => f.write_str("=="),
			Self::And => f.write_str("&&"),
			Self::Or => f.write_str("||"),
			Self::Pi => f.write_str("π"),
			Self::Number(value) => Display::fmt(&value, f),
			Self::Ident(name) => f.write_str(name),
		}
	}
}

#[cfg(test)]
mod tests {
	use logos::Logos as _;

	use super::Token;

	#[test]
	fn relational_operators_take_longest_match() {
		let tokens = Token::lexer("a<=b>c==d")
			.collect::<Result<Vec<_>, _>>()
			.unwrap();

		assert_eq!(
			tokens,
			[
				Token::Ident("a"),
				Token::LessEqual,
				Token::Ident("b"),
				Token::Greater,
				Token::Ident("c"),
				Token::Equal,
				Token::Ident("d"),
			]
		);
	}

	#[test]
	fn numbers_accept_bare_fractions() {
		let tokens = Token::lexer("2. .5 10.25")
			.collect::<Result<Vec<_>, _>>()
			.unwrap();

		assert_eq!(
			tokens,
			[Token::Number(2.0), Token::Number(0.5), Token::Number(10.25)]
		);
	}

	#[test]
	fn stray_characters_are_errors() {
		assert!(Token::lexer("x $ 2").any(|t| t.is_err()));
	}

	#[test]
	fn extra_dots_make_one_bad_number() {
		let tokens = Token::lexer("1.2.3").collect::<Vec<_>>();

		assert_eq!(tokens.len(), 1);
		assert!(tokens[0].is_err());
		assert!(Token::lexer(".").any(|t| t.is_err()));
	}

	#[test]
	fn commas_are_not_operators() {
		assert!(Token::lexer("x, 2").any(|t| t.is_err()));
	}
}
