#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

mod color;
mod config;
mod contour;
mod debounce;
mod error;
mod roots;
mod sample;
mod scene;
mod snapshot;
mod store;
mod view;

pub use self::{
	color::*, config::*, contour::*, debounce::*, error::*, roots::*, sample::*, scene::*,
	snapshot::*, view::*,
};
