//! Tree-wide derivation.
//!
//! These passes walk the whole tree and store html fragments as synthetic
//! headers (`__node-list-html`, `__tag-list-html` and their `-canonical`
//! variants) for the merge engine to read. They must all run before any page
//! is rendered.

use std::collections::BTreeSet;

use crate::NodeTree;
use crate::UrielError;
use crate::UrielResult;
use crate::headers;
use crate::headers::fragment_key;
use crate::node::NodeId;

const TAG_LINK_SEPARATOR: &str = ", ";

/// Run every derivation pass over the tree containing `root`.
///
/// The site relative pass always runs. The canonical pass runs only when the
/// root has a `canonical-url` header.
pub fn augment_node_tree(tree: &mut NodeTree, root: NodeId) -> UrielResult<()> {
	let root = tree.root_of(root);
	let mut passes = vec![false];
	if tree.node(root).has_header(headers::CANONICAL_URL) {
		passes.push(true);
	}

	for canonical in passes {
		tracing::debug!(canonical, "augmenting node tree");
		create_tag_node_tree(tree, root, canonical)?;
		create_tag_links_recursive(tree, root, canonical)?;
		create_child_node_list_html(tree, root, canonical)?;
	}

	Ok(())
}

/// Build one virtual child of the tag root per tag in use, each listing the
/// nodes that carry it. The tag root lists the tag nodes.
///
/// Does nothing when the root has no `tag-node` header. Tag nodes created by
/// an earlier call are reused.
pub fn create_tag_node_tree(tree: &mut NodeTree, root: NodeId, canonical: bool) -> UrielResult<()> {
	let Some(tag_root) = tree.tag_node(root)? else {
		return Ok(());
	};

	let now = tree.clock().now();
	let tag_root_node = tree.node_mut(tag_root);
	tag_root_node.set_created(now);
	tag_root_node.set_modified(now);

	let index = tree.create_tag_node_index(root)?;
	let prefix = tree.node(tag_root).subtree_prefix();
	let mut tag_nodes = Vec::with_capacity(index.len());

	for tag in index.keys() {
		let tag_node = match tree.vnode_for_tag(root, tag)? {
			Some(existing) => existing,
			None => {
				let created = tree.add_virtual_node(&format!("{prefix}{tag}"), Some(tag_root))?;
				let node = tree.node_mut(created);
				node.set_header(headers::TITLE, tag.as_str());
				node.set_header(headers::FLAT_URL, "false");
				tree.add_child(tag_root, created);
				created
			}
		};

		tag_nodes.push(tag_node);
	}

	let key = fragment_key(headers::TAG_LIST_HTML, canonical);

	for (tag, &tag_node) in index.keys().zip(&tag_nodes) {
		let mut tagged: Vec<NodeId> = index
			.get(tag)
			.map(|ids| ids.iter().copied().collect())
			.unwrap_or_default();
		tree.sort_nodes(&mut tagged)?;

		let listing = link_list(tree, tag_node, &tagged, canonical)?;
		tree.node_mut(tag_node).set_header(&key, listing);
	}

	let listing = link_list(tree, tag_root, &tag_nodes, canonical)?;
	tree.node_mut(tag_root).set_header(&key, listing);
	tree.set_tag_node_index(index);

	Ok(())
}

/// Links to the tag nodes of every tag on `id`, in tag order.
pub fn create_tag_links(tree: &NodeTree, id: NodeId, canonical: bool) -> UrielResult<String> {
	let tags = tree.node(id).tags()?;
	if tags.is_empty() || tree.tag_node(id)?.is_none() {
		return Ok(String::new());
	}

	let links = tags
		.iter()
		.map(|tag| {
			let tag_node = tree
				.vnode_for_tag(id, tag)?
				.ok_or_else(|| UrielError::TagVirtualNodeNotFound(tag.clone()))?;
			tree.link_for(tag_node, canonical)
		})
		.collect::<UrielResult<Vec<_>>>()?;

	Ok(links.join(TAG_LINK_SEPARATOR))
}

/// Store the tag links of every node below `id` as its tag list. The tag
/// root's subtree keeps the listings written by [`create_tag_node_tree`].
pub fn create_tag_links_recursive(tree: &mut NodeTree, id: NodeId, canonical: bool) -> UrielResult<()> {
	let skipped: BTreeSet<NodeId> = match tree.tag_node(id)? {
		Some(tag_root) => tree.descendants(tag_root).into_iter().collect(),
		None => BTreeSet::new(),
	};
	let key = fragment_key(headers::TAG_LIST_HTML, canonical);

	for node in tree.descendants(id) {
		if skipped.contains(&node) {
			continue;
		}

		let links = create_tag_links(tree, node, canonical)?;
		tree.node_mut(node).set_header(&key, links);
	}

	Ok(())
}

/// Store a listing of the direct children of every node below `id`.
pub fn create_child_node_list_html(tree: &mut NodeTree, id: NodeId, canonical: bool) -> UrielResult<()> {
	let key = fragment_key(headers::NODE_LIST_HTML, canonical);

	for node in tree.descendants(id) {
		let children = tree.children(node)?;
		let listing = link_list(tree, node, &children, canonical)?;
		tree.node_mut(node).set_header(&key, listing);
	}

	Ok(())
}

/// Every node below `id` whose boolean header `key` is true, `default` when
/// unset.
pub fn get_eligible_nodes(
	tree: &NodeTree,
	id: NodeId,
	key: &str,
	default: bool,
) -> UrielResult<BTreeSet<NodeId>> {
	let mut eligible = BTreeSet::new();

	for node in tree.descendants(id) {
		if tree.node(node).boolean_header(key, default)? {
			eligible.insert(node);
		}
	}

	Ok(eligible)
}

/// One line per link, wrapped in the owner's link prefix and suffix.
fn link_list(tree: &NodeTree, owner: NodeId, ids: &[NodeId], canonical: bool) -> UrielResult<String> {
	let owner = tree.node(owner);
	let lines = ids
		.iter()
		.map(|&id| {
			Ok(format!(
				"{}{}{}",
				owner.link_prefix(),
				tree.link_for(id, canonical)?,
				owner.link_suffix()
			))
		})
		.collect::<UrielResult<Vec<_>>>()?;

	Ok(lines.join("\n"))
}
