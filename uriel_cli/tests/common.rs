use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn uriel_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("uriel"));
	cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
	cmd
}

pub fn write_file(root: &Path, relative: &str, contents: &str) -> std::io::Result<()> {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, contents)
}

/// A small site with a blog section, tags and a default template.
pub fn write_site(root: &Path) -> std::io::Result<()> {
	write_file(
		root,
		"templates/default.html",
		"<title>{{node:title}}</title>\n<nav>{{breadcrumbs:*}}</nav>\n<main>\n{{node:body}}\n</main>\n{{node-list:*}}\n<footer>{{tag-list:*}}</footer>",
	)?;
	write_file(root, "nodes/index", "title: Home\ntag-node: tag\n\nWelcome home.")?;
	write_file(root, "nodes/tag", "")?;
	write_file(root, "nodes/blog/index", "title: Blog\n\nAll the posts.")?;
	write_file(
		root,
		"nodes/blog/first-post",
		"created: 2025-08-24T17:08:37-04:00\ntags: rust, web\n\nFirst!",
	)?;
	write_file(
		root,
		"nodes/blog/second-post",
		"created: 2025-08-25T09:00:00-04:00\ntags: rust\nformat: text\n\nSecond\npost",
	)
}
