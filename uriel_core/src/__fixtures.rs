use std::cell::Cell;
use std::path::Path;

use chrono::DateTime;
use chrono::Duration;
use chrono::FixedOffset;
use tempfile::TempDir;

use crate::Clock;
use crate::MemorySink;
use crate::NodeId;
use crate::NodeTree;
use crate::UrielResult;

/// A clock that moves one second forward every time it is read.
#[derive(Debug)]
pub struct SteppingClock {
	next: Cell<DateTime<FixedOffset>>,
}

impl SteppingClock {
	pub fn new() -> Self {
		Self {
			next: Cell::new(epoch()),
		}
	}
}

impl Clock for SteppingClock {
	fn now(&self) -> DateTime<FixedOffset> {
		let now = self.next.get();
		self.next.set(now + Duration::seconds(1));
		now
	}
}

pub fn epoch() -> DateTime<FixedOffset> {
	DateTime::parse_from_rfc3339("2025-01-01T00:00:00-04:00").unwrap_or_default()
}

pub fn project_dir() -> TempDir {
	tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create a temp dir: {e}"))
}

/// A tree over `root` logging to a shared [`MemorySink`].
pub fn memory_tree(root: &Path) -> (NodeTree, MemorySink) {
	let sink = MemorySink::new();
	let tree = NodeTree::new(root)
		.with_clock(SteppingClock::new())
		.with_sink(sink.clone());

	(tree, sink)
}

pub fn write_file(path: impl AsRef<Path>, contents: &str) {
	let path = path.as_ref();
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)
			.unwrap_or_else(|e| panic!("failed to create {}: {e}", parent.display()));
	}
	std::fs::write(path, contents).unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}

/// `index → foo/index → foo/bar/index → foo/bar/baz/index → foo/bar/baz/quux`
pub struct Chain {
	pub root: NodeId,
	pub foo: NodeId,
	pub bar: NodeId,
	pub baz: NodeId,
	pub quux: NodeId,
}

impl Chain {
	pub fn all(&self) -> [NodeId; 5] {
		[self.root, self.foo, self.bar, self.baz, self.quux]
	}
}

/// Build the virtual [`Chain`], calling `configure_root` before any child
/// exists so its headers cascade.
pub fn chain_tree_with(
	tree: &mut NodeTree,
	configure_root: impl FnOnce(&mut NodeTree, NodeId),
) -> UrielResult<Chain> {
	let root = tree.add_virtual_node("index", None)?;
	configure_root(tree, root);

	let foo = tree.add_virtual_node("foo/index", Some(root))?;
	let bar = tree.add_virtual_node("foo/bar/index", Some(foo))?;
	let baz = tree.add_virtual_node("foo/bar/baz/index", Some(bar))?;
	let quux = tree.add_virtual_node("foo/bar/baz/quux", Some(baz))?;

	tree.add_child(root, foo);
	tree.add_child(foo, bar);
	tree.add_child(bar, baz);
	tree.add_child(baz, quux);

	Ok(Chain {
		root,
		foo,
		bar,
		baz,
		quux,
	})
}

pub fn chain_tree(tree: &mut NodeTree) -> UrielResult<Chain> {
	chain_tree_with(tree, |_, _| {})
}

/// The chain plus a `tag` node under the root, tagged the same way in every
/// derivation test.
pub fn tagged_chain_tree(tree: &mut NodeTree, canonical: bool) -> UrielResult<(Chain, NodeId)> {
	let chain = chain_tree_with(tree, |tree, root| {
		let root = tree.node_mut(root);
		if canonical {
			root.set_header("canonical-url", "https://example.com");
		}
		root.set_header("tag-node", "tag");
	})?;

	let tag = tree.add_virtual_node("tag", Some(chain.root))?;
	tree.add_child(chain.root, tag);

	tree.node_mut(chain.foo).set_header("tags", "a");
	tree.node_mut(chain.bar).set_header("tags", "b");
	tree.node_mut(chain.baz).set_header("tags", "c");
	tree.node_mut(chain.quux).set_header("tags", "a, b, c, d");

	Ok((chain, tag))
}
