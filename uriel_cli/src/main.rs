use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;
use uriel_cli::Commands;
use uriel_cli::UrielCli;
use uriel_core::AnyEmptyResult;
use uriel_core::SojuRegistry;
use uriel_core::UrielError;
use uriel_core::project::load_project;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = UrielCli::parse();

	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match args.command {
		Some(Commands::Build { dry_run }) => run_build(&args, dry_run),
		None => {
			eprintln!("No subcommand specified. Run `uriel --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<UrielError>() {
			Ok(uriel_err) => {
				let report: miette::Report = (*uriel_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// `RUST_LOG` wins over the level picked by `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "info" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

fn resolve_root(args: &UrielCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn run_build(args: &UrielCli, dry_run: bool) -> AnyEmptyResult {
	let root = resolve_root(args);
	tracing::debug!(root = %root.display(), "building site");

	let registry = SojuRegistry::with_builtins();
	let mut project = load_project(&root)?;
	project.render(Some(&registry))?;

	if dry_run {
		println!(
			"{} {} nodes rendered, nothing written",
			colored!("Dry run:", green),
			project.tree.len()
		);
		return Ok(());
	}

	project.write()?;
	println!(
		"{} {} nodes written to {}",
		colored!("Built:", green),
		project.tree.len(),
		project.tree.public_dir().display()
	);

	Ok(())
}
