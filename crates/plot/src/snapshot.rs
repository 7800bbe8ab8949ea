use grapher_expr::{Classification, ParameterInfo};
use serde::{Deserialize, Serialize};

use crate::{
	ContourQuality, DerivedPoint, EquationId, Rgb, Scene, Segment, ViewTransform, grid_steps,
};

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
	pub view: ViewTransform,
	pub width: f64,
	pub height: f64,
	/// Major and minor grid spacing.
	pub grid: (f64, f64),
	pub curves: Vec<CurveSnapshot>,
	pub points: Vec<PointSnapshot>,
	pub intercepts: Vec<DerivedPoint>,
	pub intersections: Vec<DerivedPoint>,
	pub pins: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
	pub id: EquationId,
	pub text: String,
	pub color: Rgb,
	pub classification: Classification,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub error: Option<String>,
	pub parameters: Vec<ParameterInfo>,
	pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
	/// Vertices in equation space, a NaN `y` starting a new stroke.
	Polyline(Vec<(f64, f64)>),
	Contour {
		quality: ContourQuality,
		segments: Vec<Segment>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSnapshot {
	pub id: EquationId,
	pub x: f64,
	pub y: f64,
	pub color: Rgb,
}

impl Scene {
	/// Captures the current frame. Implicit curves without a usable cache get a
	/// coarse preview traced on the spot.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn snapshot(&mut self) -> SceneSnapshot {
		let ids = self
			.equations()
			.filter(|(_, equation)| equation.model().point().is_none())
			.map(|(id, _)| id)
			.collect::<Vec<_>>();

		let mut curves = Vec::with_capacity(ids.len());

		for id in ids {
			let geometry = match self.contour(id) {
				Some(contour) => Geometry::Contour {
					quality: contour.quality(),
					segments: contour.segments().to_vec(),
				},
				None => Geometry::Polyline(self.explicit_polyline(id)),
			};

			let Some(equation) = self.equation(id) else {
				continue;
			};
			let model = equation.model();

			curves.push(CurveSnapshot {
				id,
				text: model.raw().to_owned(),
				color: equation.color(),
				classification: model.classification(),
				error: model.error().map(ToString::to_string),
				parameters: model.parameters().infos(),
				geometry,
			});
		}

		let points = self
			.points()
			.map(|(id, x, y, color)| PointSnapshot { id, x, y, color })
			.collect();

		let viewport = self.viewport();

		SceneSnapshot {
			view: viewport.transform(),
			width: viewport.width(),
			height: viewport.height(),
			grid: grid_steps(viewport.scale()),
			curves,
			points,
			intercepts: self.intercepts().to_vec(),
			intersections: self.intersections().to_vec(),
			pins: self.pins().to_vec(),
		}
	}
}
