#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

mod ast;
mod equation;
mod error;
mod params;
mod parser;
mod token;

pub use self::{ast::*, equation::*, error::*, params::*};

/// Compiles one line of user text. Shorthand for [`EquationModel::compile`].
#[must_use]
pub fn compile(text: &str) -> EquationModel {
	EquationModel::compile(text)
}
