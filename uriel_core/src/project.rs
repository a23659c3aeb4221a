//! Loading a project from disk and writing the rendered site.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::NodeTree;
use crate::Page;
use crate::UrielConfig;
use crate::UrielError;
use crate::UrielResult;
use crate::derive::augment_node_tree;
use crate::node::NodeId;
use crate::soju::SojuRegistry;

const INDEX: &str = "index";
const TYPE_COLUMN_WIDTH: usize = 7;

/// A loaded project: its configuration and the node tree read from
/// `nodes/`.
#[derive(Debug)]
pub struct Project {
	pub config: UrielConfig,
	pub tree: NodeTree,
	pub root: NodeId,
}

impl Project {
	/// Derive the synthetic headers and render every node.
	pub fn render(&mut self, soju: Option<&SojuRegistry>) -> UrielResult<()> {
		augment_node_tree(&mut self.tree, self.root)?;
		render_node_tree(&mut self.tree, self.root, soju, &self.config.templates.default)
	}

	/// Write every rendered node below `public/`.
	pub fn write(&self) -> UrielResult<()> {
		write_dynamic_nodes(&self.tree, self.root)
	}
}

/// Load the config at `root` and read its node tree.
pub fn load_project(root: &Path) -> UrielResult<Project> {
	load_project_with(NodeTree::new(root))
}

/// Like [`load_project`] for a tree already set up with its collaborators.
pub fn load_project_with(mut tree: NodeTree) -> UrielResult<Project> {
	let config = UrielConfig::load(tree.project_root())?.unwrap_or_default();
	let root = create_file_node_tree(&mut tree, &config.exclude.patterns)?;

	Ok(Project { config, tree, root })
}

/// Read `nodes/` into `tree` and return the root.
///
/// Every directory needs an `index` file, which becomes the directory's node.
/// Other files become its children. Entries are visited in name order and
/// hidden entries are skipped.
pub fn create_file_node_tree(tree: &mut NodeTree, exclude_patterns: &[String]) -> UrielResult<NodeId> {
	let nodes_dir = tree.nodes_dir();
	tracing::debug!(path = %nodes_dir.display(), "reading nodes");

	if !nodes_dir.join(INDEX).is_file() {
		return Err(UrielError::MissingIndex(nodes_dir.display().to_string()));
	}

	let exclude = build_exclude_matcher(&nodes_dir, exclude_patterns)?;
	let root = tree.add_file_node(INDEX, None)?;
	let mut visited_dirs = HashSet::new();
	walk_dir(tree, &nodes_dir, "", root, &exclude, &mut visited_dirs)?;

	Ok(root)
}

/// Build a `Gitignore` matcher from the `[exclude]` patterns of the config.
fn build_exclude_matcher(nodes_dir: &Path, patterns: &[String]) -> UrielResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(nodes_dir);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			UrielError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| UrielError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

pub(crate) fn walk_dir(
	tree: &mut NodeTree,
	dir: &Path,
	prefix: &str,
	parent: NodeId,
	exclude: &Gitignore,
	visited_dirs: &mut HashSet<PathBuf>,
) -> UrielResult<()> {
	let canonical = dir.canonicalize()?;
	if !visited_dirs.insert(canonical) {
		return Err(UrielError::SymlinkCycle {
			path: dir.display().to_string(),
		});
	}

	let mut entries = fs::read_dir(dir)?
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<Result<Vec<_>, _>>()?;
	entries.sort();

	for path in entries {
		let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
			tracing::warn!(path = %path.display(), "skipping entry with a non UTF-8 name");
			continue;
		};

		if name.starts_with('.') || (name == INDEX && path.is_file()) {
			continue;
		}

		let is_dir = path.is_dir();
		if exclude.matched(&path, is_dir).is_ignore() {
			continue;
		}

		let node_path = format!("{prefix}{name}");

		if is_dir {
			if !path.join(INDEX).is_file() {
				return Err(UrielError::MissingIndex(path.display().to_string()));
			}

			let child = tree.add_file_node(&format!("{node_path}/{INDEX}"), Some(parent))?;
			tree.add_child(parent, child);
			walk_dir(tree, &path, &format!("{node_path}/"), child, exclude, visited_dirs)?;
		} else {
			let child = tree.add_file_node(&node_path, Some(parent))?;
			tree.add_child(parent, child);
		}
	}

	Ok(())
}

/// Render every node below `id` with site relative urls and store the result
/// as its rendered body.
pub fn render_node_tree(
	tree: &mut NodeTree,
	id: NodeId,
	soju: Option<&SojuRegistry>,
	default_template: &str,
) -> UrielResult<()> {
	for node in tree.descendants(id) {
		tracing::debug!(node = tree.node(node).path(), "rendering");

		let rendered = {
			let mut page = Page::new(tree, node, false).with_default_template(default_template);
			if let Some(registry) = soju {
				page = page.with_soju(registry);
			}
			page.render()?
		};

		tree.node_mut(node).set_rendered_body(rendered);
	}

	Ok(())
}

/// The longest url and the longest path below `id`.
pub fn get_max_url_path_len(tree: &NodeTree, id: NodeId) -> UrielResult<(usize, usize)> {
	let mut max_url_len = 0;
	let mut max_path_len = 0;

	for node in tree.descendants(id) {
		max_url_len = max_url_len.max(tree.url(node)?.len());
		max_path_len = max_path_len.max(tree.node(node).path().len());
	}

	Ok((max_url_len, max_path_len))
}

/// Write each rendered node below `id` to `public/<url>/index.html`, logging
/// one table row per node. Fails when two nodes share a url.
pub fn write_nodes(
	tree: &NodeTree,
	id: NodeId,
	path_width: usize,
	unique_urls: &mut HashSet<String>,
) -> UrielResult<()> {
	let node = tree.node(id);
	let url = tree.url(id)?;

	if !unique_urls.insert(url.clone()) {
		return Err(UrielError::DuplicateUrl {
			node: node.path().to_string(),
			url,
		});
	}

	tree.sink().info(&format!(
		"{:<type_width$} | {:<path_width$} | {url}",
		node.kind().as_str(),
		node.path(),
		type_width = TYPE_COLUMN_WIDTH,
	));

	fs::create_dir_all(tree.dest_dir(id)?)?;
	fs::write(tree.dest_file(id)?, node.rendered_body().unwrap_or_default())?;

	for child in tree.children(id)? {
		write_nodes(tree, child, path_width, unique_urls)?;
	}

	Ok(())
}

/// Write the whole tree, framing the rows of [`write_nodes`] as a table.
pub fn write_dynamic_nodes(tree: &NodeTree, root: NodeId) -> UrielResult<()> {
	let (max_url_len, max_path_len) = get_max_url_path_len(tree, root)?;
	let sink = tree.sink();
	let separator = format!(
		"{}+{}+{}",
		"-".repeat(TYPE_COLUMN_WIDTH + 1),
		"-".repeat(max_path_len + 2),
		"-".repeat(max_url_len + 1)
	);

	sink.info(&format!(
		"creating pages in '{}' from nodes and templates",
		tree.public_dir().display()
	));
	sink.info(&separator);
	sink.info(&format!(
		"{:<type_width$} | {:<max_path_len$} | url",
		"type",
		"node",
		type_width = TYPE_COLUMN_WIDTH,
	));
	sink.info(&separator);

	let mut unique_urls = HashSet::new();
	write_nodes(tree, root, max_path_len, &mut unique_urls)?;

	sink.info(&separator);

	Ok(())
}
