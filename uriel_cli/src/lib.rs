use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Build a static site from a tree of nodes and templates.",
	long_about = "uriel reads the nodes under `nodes/`, cascades their headers from parent to \
	              child, derives tag pages and link listings across the tree, and merges every \
	              node into its template from `templates/`.\n\nThe rendered pages are written to \
	              `public/<url>/index.html`.\n\nQuick start:\n  uriel build            Render \
	              and write the site\n  uriel build --dry-run  Render without writing"
)]
pub struct UrielCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Render every node and write the site to `public/`.
	///
	/// Loads `uriel.toml` if present, reads the node tree from `nodes/`,
	/// derives the tag pages and link listings, then merges each node into its
	/// template. Fails on the first merge error, include loop, or duplicate
	/// url.
	Build {
		/// Render every page but write nothing to `public/`.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
}
