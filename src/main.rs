mod args;

use std::{
	fs,
	io::{self, prelude::*},
	path::Path,
	time::{Duration, Instant},
};

use clap::Parser as _;
use color_eyre::Result;
use grapher_plot::{PlotConfig, Scene, SceneError, SceneSnapshot, ViewTransform};
use ron::ser::PrettyConfig;
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_indicatif::{IndicatifLayer, filter::IndicatifFilter, style::ProgressStyle};
use tracing_subscriber::{
	EnvFilter,
	fmt::{self, format::FmtSpan},
	prelude::*,
};

use self::args::Args;

const CONTOUR_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
	let args = match Args::try_parse() {
		Ok(a) => a,
		Err(e) => {
			eprintln!("{e}");
			return Ok(());
		}
	};

	install_tracing(args.log_dir.as_deref())?;
	color_eyre::install()?;

	let config = match &args.config_path {
		Some(path) => toml::from_str::<PlotConfig>(&fs::read_to_string(path)?)?,
		None => PlotConfig::default(),
	};

	let scale = args.scale.unwrap_or(config.default_scale);
	let mut scene = Scene::new(config, args.width, args.height)?;

	scene.load(args.file_path())?;
	scene.set_view(ViewTransform::new(args.center_x, args.center_y, scale));

	apply_params(&mut scene, &args)?;

	let snapshot = refine(&mut scene);
	let output = ron::ser::to_string_pretty(
		&snapshot,
		PrettyConfig::new().separate_tuple_members(true),
	)?;

	match args.output_path() {
		Some(path) => {
			fs::write(path, output)?;
			info!("wrote snapshot to {}", path.display());
		}
		None => {
			let mut stdout = io::stdout().lock();
			stdout.write_all(output.as_bytes())?;
			stdout.write_all(b"\n")?;
			stdout.flush()?;
		}
	}

	scene.shutdown();

	Ok(())
}

#[tracing::instrument(skip_all, fields(indicatif.pb_show = tracing::field::Empty))]
fn refine(scene: &mut Scene) -> SceneSnapshot {
	info!("waiting for fine contours");

	if !scene.wait_for_contours(CONTOUR_TIMEOUT) {
		warn!("fine contours still running after {CONTOUR_TIMEOUT:?}, keeping previews");
	}

	scene.snapshot()
}

#[tracing::instrument(skip_all, fields(indicatif.pb_show = tracing::field::Empty))]
fn apply_params(scene: &mut Scene, args: &Args) -> Result<(), SceneError> {
	if args.params.is_empty() {
		return Ok(());
	}

	let now = Instant::now();
	let ids = scene.equations().map(|(id, _)| id).collect::<Vec<_>>();

	for param in &args.params {
		let mut applied = false;

		for &id in &ids {
			match scene.set_parameter(id, param.name, param.value, now) {
				Ok(()) => applied = true,
				Err(SceneError::UnknownParameter(..)) => {}
				Err(e) => return Err(e),
			}
		}

		if !applied {
			warn!("no equation uses parameter '{}'", param.name);
		}
	}

	scene.poll(now + scene.config().parameter_debounce());

	Ok(())
}

fn install_tracing(log_dir: Option<&Path>) -> Result<()> {
	let indicatif_layer = IndicatifLayer::new().with_progress_style(
		ProgressStyle::with_template("{spinner} {span_name} [{elapsed_precise}]")?,
	);

	let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let fmt_layer = fmt::layer()
		.with_target(false)
		.with_writer(indicatif_layer.get_stderr_writer())
		.with_filter(filter_layer);

	let json_file_layer = match log_dir {
		Some(dir) => {
			fs::create_dir_all(dir)?;

			let json_log_file = fs::OpenOptions::new()
				.create(true)
				.truncate(true)
				.write(true)
				.open(dir.join("output.json"))?;

			Some(
				fmt::layer()
					.with_ansi(false)
					.json()
					.flatten_event(true)
					.with_span_events(FmtSpan::FULL)
					.with_writer(json_log_file),
			)
		}
		None => None,
	};

	tracing_subscriber::registry()
		.with(json_file_layer)
		.with(fmt_layer)
		.with(indicatif_layer.with_filter(IndicatifFilter::new(false)))
		.with(ErrorLayer::default())
		.init();

	Ok(())
}
