use grapher_expr::EquationModel;
use rayon::prelude::*;

use super::Segment;

#[derive(Debug, Clone, Copy)]
struct Corner {
	x: f64,
	y: f64,
	value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
	Top,
	Right,
	Bottom,
	Left,
}

/// Edge pairs to join for each corner-sign code. Bits are TL=8, TR=4, BR=2,
/// BL=1, set when the corner is positive. The saddles 5 and 10 get both
/// corner-cutting segments.
const CASES: [&[(Edge, Edge)]; 16] = {
	use Edge::{Bottom, Left, Right, Top};

	[
		&[],
		&[(Left, Bottom)],
		&[(Bottom, Right)],
		&[(Left, Right)],
		&[(Top, Right)],
		&[(Left, Bottom), (Top, Right)],
		&[(Top, Bottom)],
		&[(Left, Top)],
		&[(Left, Top)],
		&[(Top, Bottom)],
		&[(Left, Top), (Bottom, Right)],
		&[(Top, Right)],
		&[(Left, Right)],
		&[(Bottom, Right)],
		&[(Left, Bottom)],
		&[],
	]
};

/// Where the zero crossing sits between `a` and `b`.
fn crossing(a: Corner, b: Corner) -> (f64, f64) {
	let (va, vb) = (a.value.abs(), b.value.abs());
	let sum = va + vb;

	let t = if sum.is_finite() && sum != 0.0 {
		va / sum
	} else {
		0.5
	};

	(t.mul_add(b.x - a.x, a.x), t.mul_add(b.y - a.y, a.y))
}

/// Runs marching squares on one cell, corners given as TL, TR, BR, BL.
fn march_cell(corners: [Corner; 4], out: &mut Vec<Segment>) {
	if corners.iter().any(|c| c.value.is_nan()) {
		return;
	}

	let code = corners
		.iter()
		.fold(0usize, |code, c| (code << 1) | usize::from(c.value > 0.0));

	let [tl, tr, br, bl] = corners;
	let point = |edge| match edge {
		Edge::Top => crossing(tl, tr),
		Edge::Right => crossing(tr, br),
		Edge::Bottom => crossing(bl, br),
		Edge::Left => crossing(tl, bl),
	};

	out.extend(CASES[code].iter().map(|&(a, b)| {
		let ((x1, y1), (x2, y2)) = (point(a), point(b));
		Segment { x1, y1, x2, y2 }
	}));
}

/// A rectangular grid of field values, stored row by row from the top.
#[derive(Debug, Clone)]
pub(super) struct Lattice {
	min_x: f64,
	max_y: f64,
	dx: f64,
	dy: f64,
	columns: usize,
	rows: usize,
	values: Vec<f64>,
}

impl Lattice {
	fn empty(min_x: f64, max_y: f64, dx: f64, dy: f64, columns: usize, rows: usize) -> Self {
		Self {
			min_x,
			max_y,
			dx,
			dy,
			columns,
			rows,
			values: vec![f64::NAN; (columns + 1) * (rows + 1)],
		}
	}

	/// Evaluates every vertex, one row per task.
	pub(super) fn evaluate(
		model: &EquationModel,
		min_x: f64,
		max_y: f64,
		dx: f64,
		dy: f64,
		columns: usize,
		rows: usize,
	) -> Self {
		let mut lattice = Self::empty(min_x, max_y, dx, dy, columns, rows);
		let (x0, y0) = (lattice.min_x, lattice.max_y);

		lattice
			.values
			.par_chunks_mut(columns + 1)
			.enumerate()
			.for_each(|(j, row)| {
				let y = (j as f64).mul_add(-dy, y0);
				for (i, value) in row.iter_mut().enumerate() {
					*value = model.eval_implicit((i as f64).mul_add(dx, x0), y);
				}
			});

		lattice
	}

	/// Same as [`Self::evaluate`] without fanning out, for lattices small enough
	/// that are already evaluated from inside a parallel job.
	pub(super) fn evaluate_local(
		model: &EquationModel,
		min_x: f64,
		max_y: f64,
		dx: f64,
		dy: f64,
		columns: usize,
		rows: usize,
	) -> Self {
		let mut lattice = Self::empty(min_x, max_y, dx, dy, columns, rows);

		for (j, row) in lattice.values.chunks_mut(columns + 1).enumerate() {
			let y = (j as f64).mul_add(-dy, max_y);
			for (i, value) in row.iter_mut().enumerate() {
				*value = model.eval_implicit((i as f64).mul_add(dx, min_x), y);
			}
		}

		lattice
	}

	pub(super) const fn columns(&self) -> usize {
		self.columns
	}

	pub(super) const fn rows(&self) -> usize {
		self.rows
	}

	pub(super) fn x(&self, i: usize) -> f64 {
		(i as f64).mul_add(self.dx, self.min_x)
	}

	pub(super) fn y(&self, j: usize) -> f64 {
		(j as f64).mul_add(-self.dy, self.max_y)
	}

	fn corner(&self, i: usize, j: usize) -> Corner {
		Corner {
			x: self.x(i),
			y: self.y(j),
			value: self.values[j * (self.columns + 1) + i],
		}
	}

	fn corners(&self, i: usize, j: usize) -> [Corner; 4] {
		[
			self.corner(i, j),
			self.corner(i + 1, j),
			self.corner(i + 1, j + 1),
			self.corner(i, j + 1),
		]
	}

	/// Whether cell `(i, j)` may hold part of the zero set: its finite corners
	/// disagree in sign, or some corner is undefined while another is not.
	pub(super) fn straddles(&self, i: usize, j: usize) -> bool {
		let corners = self.corners(i, j);
		let defined = corners.iter().filter(|c| !c.value.is_nan()).count();

		if defined == 0 {
			return false;
		}

		if defined < corners.len() {
			return true;
		}

		let positive = corners.iter().filter(|c| c.value > 0.0).count();
		positive != 0 && positive != corners.len()
	}

	pub(super) fn march_into(&self, i: usize, j: usize, out: &mut Vec<Segment>) {
		march_cell(self.corners(i, j), out);
	}

	pub(super) fn march_local(&self) -> Vec<Segment> {
		let mut out = Vec::new();

		for j in 0..self.rows {
			for i in 0..self.columns {
				self.march_into(i, j, &mut out);
			}
		}

		out
	}

	/// Marches every cell, rows in parallel, keeping row order in the output.
	pub(super) fn march(&self) -> Vec<Segment> {
		(0..self.rows)
			.into_par_iter()
			.flat_map_iter(|j| {
				let mut row = Vec::new();
				for i in 0..self.columns {
					self.march_into(i, j, &mut row);
				}
				row
			})
			.collect()
	}
}
