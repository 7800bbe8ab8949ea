use std::{
	env, fs, process,
	time::{Duration, Instant},
};

use grapher_plot::{
	ContourQuality, Equation, Geometry, INTERSECTION_COLOR, PlotConfig, Rgb, Scene, SceneError,
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn scene() -> Result<Scene, SceneError> {
	Scene::new(PlotConfig::default(), 800.0, 600.0)
}

fn close(a: f64, b: f64) -> bool {
	(a - b).abs() < 1e-6
}

#[test]
fn parameter_write_is_visible_before_rebuild() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("y = a*x");
	let now = Instant::now();

	assert!(scene.equation(id).and_then(Equation::samples).is_some());
	assert!(close(scene.curve_y(id, 2.0), 2.0));

	scene.set_parameter(id, 'a', 3.0, now)?;

	assert!(scene.equation(id).and_then(Equation::samples).is_none());
	assert!(close(scene.curve_y(id, 2.0), 6.0));
	assert_eq!(
		scene.next_deadline(),
		Some(now + scene.config().parameter_debounce())
	);

	assert!(!scene.poll(now));
	assert!(scene.poll(now + Duration::from_millis(60)));

	let samples = scene.equation(id).and_then(Equation::samples);
	assert!(samples.is_some_and(|samples| close(samples.get_y(2.0), 6.0)));

	Ok(())
}

#[test]
fn unknown_parameter_is_rejected() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("y = a*x");

	assert!(matches!(
		scene.set_parameter(id, 'b', 2.0, Instant::now()),
		Err(SceneError::UnknownParameter(_, 'b'))
	));
	assert!(matches!(
		scene.set_parameter_range(id, 'a', 5.0, 1.0),
		Err(SceneError::InvalidRange { .. })
	));

	Ok(())
}

#[test]
fn parameters_survive_recompilation() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("y = a*x + b");

	scene.set_parameter(id, 'a', 4.0, Instant::now())?;
	scene.set_text(id, "y = a*x^2")?;

	let parameters = scene.parameters(id)?;
	assert_eq!(parameters.len(), 1);
	assert_eq!(parameters[0].name, 'a');
	assert_eq!(parameters[0].value, 4.0);

	Ok(())
}

#[test]
fn fine_contour_replaces_preview_and_is_reused() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("x^2 + y^2 = 4");

	assert!(scene.is_refining(id));
	assert!(scene.wait_for_contours(TIMEOUT));

	let first = scene
		.equation(id)
		.and_then(Equation::contour)
		.map(|contour| (contour.quality(), contour.segments().to_vec()));
	let Some((quality, segments)) = first else {
		panic!("no contour installed");
	};

	assert_eq!(quality, ContourQuality::Fine);
	assert!(!segments.is_empty());

	scene.pan(5.0, 0.0);
	assert!(!scene.is_refining(id));

	scene.refresh_all();
	assert!(scene.wait_for_contours(TIMEOUT));

	let second = scene.equation(id).and_then(Equation::contour);
	assert!(second.is_some_and(|contour| contour.segments() == segments.as_slice()));

	Ok(())
}

#[test]
fn parameter_write_evicts_contour_and_cancels_refinement() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("x^2 + y^2 = r");
	let now = Instant::now();

	assert!(scene.is_refining(id));
	assert!(scene.equation(id).and_then(Equation::contour).is_some());

	scene.set_parameter(id, 'r', 4.0, now)?;

	assert!(scene.equation(id).and_then(Equation::contour).is_none());
	assert!(!scene.is_refining(id));

	assert!(scene.poll(now + scene.config().parameter_debounce()));
	assert!(scene.equation(id).and_then(Equation::contour).is_some());

	assert!(scene.wait_for_contours(TIMEOUT));
	assert_eq!(
		scene.contour(id).map(|contour| contour.quality()),
		Some(ContourQuality::Fine)
	);

	Ok(())
}

#[test]
fn preview_is_not_queued_behind_refinement() -> Result<(), SceneError> {
	let config = PlotConfig {
		fine_subdivisions: 60,
		worker_threads: 2,
		..PlotConfig::default()
	};
	let mut scene = Scene::new(config, 1600.0, 1200.0)?;
	let id = scene.add_equation("sin(x*y) + cos(x^2 - y) + sin(x + y^2) = 0.2");

	assert!(scene.is_refining(id));

	scene.begin_interaction();
	scene.pan(40.0, 0.0);

	let started = Instant::now();
	let quality = scene.contour(id).map(|contour| contour.quality());

	assert_eq!(quality, Some(ContourQuality::Preview));
	assert!(started.elapsed() < Duration::from_secs(2));

	scene.shutdown();

	Ok(())
}

#[test]
fn interaction_holds_back_fine_pass() -> Result<(), SceneError> {
	let mut scene = scene()?;

	scene.begin_interaction();
	let id = scene.add_equation("x^4 + y^4 = 16");

	assert!(!scene.is_refining(id));
	assert_eq!(
		scene.contour(id).map(|contour| contour.quality()),
		Some(ContourQuality::Preview)
	);

	scene.pan(30.0, -10.0);
	assert!(!scene.is_refining(id));

	scene.end_interaction();
	assert!(scene.is_refining(id));
	assert!(scene.wait_for_contours(TIMEOUT));
	assert_eq!(
		scene.contour(id).map(|contour| contour.quality()),
		Some(ContourQuality::Fine)
	);

	Ok(())
}

#[test]
fn scroll_refresh_waits_for_settle() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("x^2 - y^2 = 1");
	assert!(scene.wait_for_contours(TIMEOUT));

	let now = Instant::now();
	let scale = scene.viewport().scale();
	scene.zoom_at(100.0, 100.0, true, now);

	assert!(scene.viewport().scale() > scale);
	assert!(scene.is_interacting());
	assert!(!scene.poll(now + Duration::from_millis(50)));
	assert!(!scene.is_refining(id));

	assert!(scene.poll(now + scene.config().scroll_settle()));
	assert!(!scene.is_interacting());
	assert!(scene.is_refining(id));

	Ok(())
}

#[test]
fn shifted_line_has_both_intercepts() -> Result<(), SceneError> {
	let mut scene = scene()?;
	scene.add_equation("y = x - 1");

	let intercepts = scene.intercepts();

	assert_eq!(intercepts.len(), 2);
	assert!(
		intercepts
			.iter()
			.any(|point| close(point.x, 0.0) && close(point.y, -1.0))
	);
	assert!(
		intercepts
			.iter()
			.any(|point| close(point.x, 1.0) && point.y == 0.0)
	);

	Ok(())
}

#[test]
fn crossing_lines_intersect_once() -> Result<(), SceneError> {
	let mut scene = scene()?;
	scene.add_equation("y = x");
	scene.add_equation("y = 2 - x");

	let intersections = scene.intersections();

	assert_eq!(intersections.len(), 1);
	assert!(close(intersections[0].x, 1.0));
	assert!(close(intersections[0].y, 1.0));
	assert_eq!(intersections[0].color, INTERSECTION_COLOR);

	Ok(())
}

#[test]
fn click_toggles_pin_on_intersection() -> Result<(), SceneError> {
	let mut scene = scene()?;
	scene.add_equation("y = x");
	scene.add_equation("y = 2 - x");

	let (px, py) = scene.viewport().to_pixel(1.0, 1.0);

	let hover = scene.hover(px + 3.0, py - 2.0);
	assert!(hover.is_some_and(|hover| hover.snappable && hover.color == INTERSECTION_COLOR));

	assert_eq!(scene.click(px + 3.0, py - 2.0), Some(true));
	assert_eq!(scene.pins().len(), 1);

	assert_eq!(scene.click(px, py), Some(false));
	assert!(scene.pins().is_empty());

	Ok(())
}

#[test]
fn hover_off_roots_follows_curve() -> Result<(), SceneError> {
	let mut scene = scene()?;
	scene.add_equation_with_color("y = x^2", Rgb::PURPLE);

	let (px, py) = scene.viewport().to_pixel(2.0, 4.0);
	let hover = scene.hover(px, py + 5.0);

	assert!(hover.is_some_and(|hover| {
		!hover.snappable
			&& hover.color == Rgb::PURPLE
			&& hover.x.mul_add(-hover.x, hover.y).abs() < 1e-3
	}));
	assert_eq!(scene.click(px, py + 5.0), None);

	Ok(())
}

#[test]
fn edits_compile_after_pause() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("y = x");
	let now = Instant::now();

	scene.edit_text(id, "y = 2x", now)?;
	assert!(!scene.poll(now + Duration::from_millis(100)));
	assert_eq!(scene.texts().collect::<Vec<_>>(), ["y = x"]);

	assert!(scene.poll(now + scene.config().edit_debounce()));
	assert!(close(scene.curve_y(id, 3.0), 6.0));

	scene.edit_text(id, "   ", now)?;
	scene.poll(now + Duration::from_secs(1));
	assert!(scene.is_empty());

	Ok(())
}

#[test]
fn point_literal_is_listed() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let id = scene.add_equation("(1, -2.5)");

	let points = scene.points().collect::<Vec<_>>();

	assert_eq!(points.len(), 1);
	assert_eq!(points[0].0, id);
	assert_eq!((points[0].1, points[0].2), (1.0, -2.5));
	assert!(scene.snapshot().curves.is_empty());

	Ok(())
}

#[test]
fn snapshot_carries_every_kind_of_curve() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let line = scene.add_equation("y = 1/x");
	let circle = scene.add_equation("x^2 + y^2 = 1");
	let broken = scene.add_equation("y = (x");

	let snapshot = scene.snapshot();

	assert_eq!(snapshot.curves.len(), 3);

	for curve in &snapshot.curves {
		match &curve.geometry {
			Geometry::Polyline(points) if curve.id == line => {
				assert!(points.iter().any(|(_, y)| y.is_nan()));
			}
			Geometry::Contour { segments, .. } if curve.id == circle => {
				assert!(!segments.is_empty());
			}
			Geometry::Polyline(points) if curve.id == broken => {
				assert!(curve.error.is_some());
				assert!(points.iter().all(|(_, y)| y.is_nan()));
			}
			other => panic!("unexpected geometry for {}: {other:?}", curve.id),
		}
	}

	Ok(())
}

#[test]
fn save_and_load_round_trip() -> Result<(), SceneError> {
	let path = env::temp_dir().join(format!("grapher-{}.txt", process::id()));

	let mut scene = scene()?;
	scene.add_equation("y = sin(x)");
	scene.add_equation("x^2 + y^2 = 9");
	scene.add_equation("(2, 3)");
	scene.save(&path)?;

	let mut restored = self::scene()?;
	restored.add_equation("y = 5");
	let count = restored.load(&path)?;
	fs::remove_file(&path)?;

	assert_eq!(count, 3);
	assert_eq!(
		restored.texts().collect::<Vec<_>>(),
		scene.texts().collect::<Vec<_>>()
	);

	Ok(())
}

#[test]
fn removal_clears_derived_points() -> Result<(), SceneError> {
	let mut scene = scene()?;
	let a = scene.add_equation("y = x");
	scene.add_equation("y = 2 - x");
	assert_eq!(scene.intersections().len(), 1);

	scene.remove(a)?;

	assert!(scene.intersections().is_empty());
	assert!(matches!(scene.remove(a), Err(SceneError::UnknownEquation(_))));

	Ok(())
}
