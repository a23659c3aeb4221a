//! The node tree.
//!
//! Nodes live in an arena owned by [`NodeTree`] and are addressed by
//! [`NodeId`]. A node records its parent id and an explicit list of child ids;
//! constructing a node with a parent does not attach it, use
//! [`NodeTree::add_child`] for that.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Local;

use crate::Clock;
use crate::Headers;
use crate::LogSink;
use crate::SystemClock;
use crate::TracingSink;
use crate::UrielError;
use crate::UrielResult;
use crate::headers;
use crate::headers::parse_boolean;
use crate::headers::parse_datetime;
use crate::html;

/// Directory holding node files, relative to the project root.
pub const NODES_DIR: &str = "nodes";
/// Directory holding templates, relative to the project root.
pub const TEMPLATES_DIR: &str = "templates";
/// Directory the site is written to, relative to the project root.
pub const PUBLIC_DIR: &str = "public";

const INDEX: &str = "index";
const INDEX_FILE: &str = "index.html";
const DEFAULT_LINK_PREFIX: &str = "<p>";
const DEFAULT_LINK_SUFFIX: &str = "</p>";
const DEFAULT_BREADCRUMB_SEPARATOR: &str = "&raquo;";

/// Tags mapped to the nodes carrying them.
pub type TagNodeIndex = BTreeMap<String, BTreeSet<NodeId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	/// Read from a file under `nodes/`.
	File,
	/// Built in memory.
	Virtual,
}

impl NodeKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::File => "file",
			Self::Virtual => "virtual",
		}
	}
}

impl fmt::Display for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy)]
enum CachedField {
	Title,
	Url,
}

/// Header keys whose change invalidates a cached value.
const CACHE_INVALIDATIONS: [(&str, &[CachedField]); 3] = [
	(headers::TITLE, &[CachedField::Title]),
	(headers::ESCAPE_TITLE, &[CachedField::Title]),
	(headers::FLAT_URL, &[CachedField::Url]),
];

/// One page of the site.
#[derive(Debug)]
pub struct Node {
	kind: NodeKind,
	path: String,
	name: String,
	headers: Headers,
	body: Option<String>,
	rendered_body: Option<String>,
	created: Option<DateTime<FixedOffset>>,
	modified: Option<DateTime<FixedOffset>>,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	title_cache: RefCell<Option<String>>,
	url_cache: RefCell<Option<String>>,
}

impl Node {
	pub fn kind(&self) -> NodeKind {
		self.kind
	}

	/// Slash separated path relative to `nodes/`, e.g. `articles/index`.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The last meaningful path segment: `articles/index` is `articles`.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The name with dashes turned into spaces, in title case.
	pub fn display_name(&self) -> String {
		title_case(&self.name.replace('-', " "))
	}

	/// The `title` header, falling back to the display name.
	pub fn title(&self) -> String {
		self.headers
			.get(headers::TITLE)
			.map_or_else(|| self.display_name(), ToString::to_string)
	}

	/// The title, HTML-escaped unless `escape-title` is `false`.
	pub fn escaped_title(&self) -> UrielResult<String> {
		if let Some(title) = self.title_cache.borrow().as_ref() {
			return Ok(title.clone());
		}

		let title = if self.boolean_header(headers::ESCAPE_TITLE, true)? {
			html::escape(&self.title())
		} else {
			self.title()
		};
		*self.title_cache.borrow_mut() = Some(title.clone());

		Ok(title)
	}

	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	pub fn has_header(&self, key: &str) -> bool {
		self.headers.contains(key)
	}

	pub fn header(&self, key: &str) -> UrielResult<&str> {
		self.headers
			.get(key)
			.ok_or_else(|| UrielError::HeaderNotFound {
				node: self.path.clone(),
				key: key.to_lowercase(),
			})
	}

	pub fn try_header(&self, key: &str) -> Option<&str> {
		self.headers.get(key)
	}

	pub fn header_keys(&self) -> Vec<&str> {
		self.headers.keys().collect()
	}

	pub fn header_key_values(&self) -> Vec<(&str, &str)> {
		self.headers.iter().collect()
	}

	pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
		self.headers.insert(key, value);
		self.invalidate_caches(key);
	}

	pub fn delete_header(&mut self, key: &str) -> UrielResult<()> {
		if self.headers.remove(key).is_none() {
			return Err(UrielError::HeaderNotFound {
				node: self.path.clone(),
				key: key.to_lowercase(),
			});
		}
		self.invalidate_caches(key);

		Ok(())
	}

	fn invalidate_caches(&self, key: &str) {
		let key = key.to_lowercase();
		let fields = CACHE_INVALIDATIONS
			.iter()
			.filter(|(header, _)| *header == key)
			.flat_map(|(_, fields)| fields.iter());

		for field in fields {
			match field {
				CachedField::Title => self.title_cache.replace(None),
				CachedField::Url => self.url_cache.replace(None),
			};
		}
	}

	pub fn boolean_header(&self, key: &str, default: bool) -> UrielResult<bool> {
		parse_boolean(key, self.headers.get(key), default)
	}

	pub fn link_prefix(&self) -> &str {
		self.headers
			.get(headers::LINK_PREFIX)
			.unwrap_or(DEFAULT_LINK_PREFIX)
	}

	pub fn link_suffix(&self) -> &str {
		self.headers
			.get(headers::LINK_SUFFIX)
			.unwrap_or(DEFAULT_LINK_SUFFIX)
	}

	/// The breadcrumb separator, wrapped in single spaces unless
	/// `breadcrumb-separator-spaces` is `false`.
	pub fn breadcrumb_separator(&self) -> UrielResult<String> {
		let separator = self
			.headers
			.get(headers::BREADCRUMB_SEPARATOR)
			.unwrap_or(DEFAULT_BREADCRUMB_SEPARATOR);

		if self.boolean_header(headers::BREADCRUMB_SEPARATOR_SPACES, true)? {
			Ok(format!(" {separator} "))
		} else {
			Ok(separator.to_string())
		}
	}

	/// The comma separated `tags` header, validated and de-duplicated.
	pub fn tags(&self) -> UrielResult<BTreeSet<String>> {
		let Some(value) = self.headers.get(headers::TAGS) else {
			return Ok(BTreeSet::new());
		};

		if value.trim().is_empty() {
			return Ok(BTreeSet::new());
		}

		value
			.split(',')
			.map(|tag| {
				let tag = tag.trim();
				if is_valid_tag(tag) {
					Ok(tag.to_string())
				} else {
					Err(UrielError::InvalidTag(tag.to_string()))
				}
			})
			.collect()
	}

	pub fn body(&self) -> Option<&str> {
		self.body.as_deref()
	}

	pub fn set_body(&mut self, body: impl Into<String>) {
		self.body = Some(body.into());
	}

	pub fn rendered_body(&self) -> Option<&str> {
		self.rendered_body.as_deref()
	}

	pub fn set_rendered_body(&mut self, rendered: impl Into<String>) {
		self.rendered_body = Some(rendered.into());
	}

	pub fn created(&self) -> Option<DateTime<FixedOffset>> {
		self.created
	}

	pub fn set_created(&mut self, created: DateTime<FixedOffset>) {
		self.created = Some(created);
	}

	pub fn modified(&self) -> Option<DateTime<FixedOffset>> {
		self.modified
	}

	pub fn set_modified(&mut self, modified: DateTime<FixedOffset>) {
		self.modified = Some(modified);
	}

	pub fn parent(&self) -> Option<NodeId> {
		self.parent
	}

	/// Child ids in the order they were added.
	pub fn child_ids(&self) -> &[NodeId] {
		&self.children
	}

	/// The path prefix shared by everything below this node: `tag/index` and
	/// `tag` both give `tag/`.
	pub(crate) fn subtree_prefix(&self) -> String {
		let base = self.path.strip_suffix("/index").unwrap_or(&self.path);
		format!("{base}/")
	}
}

/// Arena of nodes plus the collaborators they share.
pub struct NodeTree {
	project_root: PathBuf,
	nodes: Vec<Node>,
	tag_node_index: Option<TagNodeIndex>,
	clock: Box<dyn Clock>,
	sink: Box<dyn LogSink>,
}

impl fmt::Debug for NodeTree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeTree")
			.field("project_root", &self.project_root)
			.field("nodes", &self.nodes)
			.field("tag_node_index", &self.tag_node_index)
			.finish_non_exhaustive()
	}
}

impl NodeTree {
	pub fn new(project_root: impl Into<PathBuf>) -> Self {
		Self {
			project_root: project_root.into(),
			nodes: Vec::new(),
			tag_node_index: None,
			clock: Box::new(SystemClock),
			sink: Box::new(TracingSink),
		}
	}

	#[must_use]
	pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
		self.clock = Box::new(clock);
		self
	}

	#[must_use]
	pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
		self.sink = Box::new(sink);
		self
	}

	pub fn project_root(&self) -> &Path {
		&self.project_root
	}

	pub fn nodes_dir(&self) -> PathBuf {
		self.project_root.join(NODES_DIR)
	}

	pub fn templates_dir(&self) -> PathBuf {
		self.project_root.join(TEMPLATES_DIR)
	}

	pub fn public_dir(&self) -> PathBuf {
		self.project_root.join(PUBLIC_DIR)
	}

	pub fn clock(&self) -> &dyn Clock {
		self.clock.as_ref()
	}

	pub fn sink(&self) -> &dyn LogSink {
		self.sink.as_ref()
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
		&mut self.nodes[id.0]
	}

	/// Create an in-memory node. Without a parent its timestamps come from
	/// the clock, otherwise they are copied from the parent.
	pub fn add_virtual_node(&mut self, path: &str, parent: Option<NodeId>) -> UrielResult<NodeId> {
		let (headers, created, modified) = match parent {
			Some(parent) => {
				let parent = self.node(parent);
				(
					parent.headers.inherit(path)?,
					parent.created,
					parent.modified,
				)
			}
			None => {
				let now = self.clock.now();
				(Headers::new(), Some(now), Some(now))
			}
		};

		Ok(self.push_node(NodeKind::Virtual, path, parent, headers, None, created, modified))
	}

	/// Create a node from `nodes/<path>`.
	///
	/// `created` comes from the `created` header only, `modified` from the
	/// `modified` header or else the file's modification time.
	pub fn add_file_node(&mut self, path: &str, parent: Option<NodeId>) -> UrielResult<NodeId> {
		let file = self.nodes_dir().join(path);
		let text = std::fs::read_to_string(&file)?;

		let mut node_headers = match parent {
			Some(parent) => self.node(parent).headers.inherit(path)?,
			None => Headers::new(),
		};

		let (own_headers, body) = headers::split_source(&text);
		for (key, value) in own_headers {
			if headers::is_removal_directive(&key) {
				node_headers.apply_own_removal(path, &key, &value)?;
			} else {
				node_headers.insert(&key, value);
			}
		}

		let created = node_headers
			.get(headers::CREATED)
			.map(parse_datetime)
			.transpose()?;
		let modified = match node_headers.get(headers::MODIFIED) {
			Some(value) => parse_datetime(value)?,
			None => DateTime::<Local>::from(std::fs::metadata(&file)?.modified()?).fixed_offset(),
		};

		Ok(self.push_node(
			NodeKind::File,
			path,
			parent,
			node_headers,
			Some(body),
			created,
			Some(modified),
		))
	}

	#[allow(clippy::too_many_arguments)]
	fn push_node(
		&mut self,
		kind: NodeKind,
		path: &str,
		parent: Option<NodeId>,
		headers: Headers,
		body: Option<String>,
		created: Option<DateTime<FixedOffset>>,
		modified: Option<DateTime<FixedOffset>>,
	) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			kind,
			path: path.to_string(),
			name: node_name(path).to_string(),
			headers,
			body,
			rendered_body: None,
			created,
			modified,
			parent,
			children: Vec::new(),
			title_cache: RefCell::new(None),
			url_cache: RefCell::new(None),
		});

		id
	}

	pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
		self.node_mut(parent).children.push(child);
	}

	pub fn root_of(&self, id: NodeId) -> NodeId {
		let mut current = id;
		while let Some(parent) = self.node(current).parent {
			current = parent;
		}

		current
	}

	/// The chain from the root down to `id`, both included.
	pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
		let mut chain = vec![id];
		let mut current = id;
		while let Some(parent) = self.node(current).parent {
			chain.push(parent);
			current = parent;
		}
		chain.reverse();

		chain
	}

	/// `id` and everything attached below it, pre-order.
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut ordered = Vec::new();
		let mut stack = vec![id];

		while let Some(current) = stack.pop() {
			ordered.push(current);
			stack.extend(self.node(current).children.iter().rev());
		}

		ordered
	}

	/// The children of `id` in node order.
	pub fn children(&self, id: NodeId) -> UrielResult<Vec<NodeId>> {
		let mut children = self.node(id).children.clone();
		self.sort_nodes(&mut children)?;

		Ok(children)
	}

	/// Newest `created` first, undated last, then by title and url.
	pub fn compare(&self, a: NodeId, b: NodeId) -> UrielResult<Ordering> {
		Ok(self.sort_key(a)?.cmp(&self.sort_key(b)?))
	}

	pub fn sort_nodes(&self, ids: &mut [NodeId]) -> UrielResult<()> {
		let mut keyed = ids
			.iter()
			.map(|id| Ok((self.sort_key(*id)?, *id)))
			.collect::<UrielResult<Vec<_>>>()?;
		keyed.sort();

		for (slot, (_, id)) in ids.iter_mut().zip(keyed) {
			*slot = id;
		}

		Ok(())
	}

	fn sort_key(&self, id: NodeId) -> UrielResult<SortKey> {
		let node = self.node(id);

		Ok(SortKey {
			created: node.created,
			title: node.title(),
			url: self.url(id)?,
		})
	}

	/// The site-relative url. `index` is `/`, a parentless or `flat-url` node
	/// sits directly under `/`, anything else nests under its parent.
	pub fn url(&self, id: NodeId) -> UrielResult<String> {
		let node = self.node(id);
		if let Some(url) = node.url_cache.borrow().as_ref() {
			return Ok(url.clone());
		}

		let url = if node.path == INDEX {
			"/".to_string()
		} else {
			match node.parent {
				Some(parent) if !node.boolean_header(headers::FLAT_URL, false)? => {
					format!("{}{}/", self.url(parent)?, node.name)
				}
				_ => format!("/{}/", node.name),
			}
		};
		*node.url_cache.borrow_mut() = Some(url.clone());

		Ok(url)
	}

	/// The url prefixed with the `canonical-url` header of the node, or of its
	/// root when the node has none.
	pub fn canonical_url(&self, id: NodeId) -> UrielResult<String> {
		let base = self.site_header(id, headers::CANONICAL_URL)?;

		Ok(format!("{}{}", base.trim_end_matches('/'), self.url(id)?))
	}

	pub fn url_for(&self, id: NodeId, canonical: bool) -> UrielResult<String> {
		if canonical {
			self.canonical_url(id)
		} else {
			self.url(id)
		}
	}

	pub fn link(&self, id: NodeId) -> UrielResult<String> {
		self.link_for(id, false)
	}

	pub fn canonical_link(&self, id: NodeId) -> UrielResult<String> {
		self.link_for(id, true)
	}

	pub fn link_for(&self, id: NodeId, canonical: bool) -> UrielResult<String> {
		Ok(format!(
			"<a href=\"{}\">{}</a>",
			self.url_for(id, canonical)?,
			self.node(id).escaped_title()?
		))
	}

	/// Look a header up on the node, then on its root.
	pub(crate) fn site_header(&self, id: NodeId, key: &str) -> UrielResult<&str> {
		let node = self.node(id);
		match node.try_header(key) {
			Some(value) => Ok(value),
			None => self.node(self.root_of(id)).header(key),
		}
	}

	/// Directory the node's page is written to.
	pub fn dest_dir(&self, id: NodeId) -> UrielResult<PathBuf> {
		let url = self.url(id)?;
		let mut dir = self.public_dir();
		dir.extend(url.split('/').filter(|segment| !segment.is_empty()));

		Ok(dir)
	}

	pub fn dest_file(&self, id: NodeId) -> UrielResult<PathBuf> {
		Ok(self.dest_dir(id)?.join(INDEX_FILE))
	}

	/// Find a node by path anywhere in the tree containing `from`.
	pub fn find_node_by_path(&self, from: NodeId, path: &str) -> UrielResult<NodeId> {
		self.try_find_node_by_path(from, path)
			.ok_or_else(|| UrielError::NodeNotFound(path.to_string()))
	}

	/// Like [`find_node_by_path`](Self::find_node_by_path) but without an
	/// error. Only nodes whose subtree prefix matches `path` are descended.
	pub fn try_find_node_by_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
		let root = self.root_of(from);
		if self.node(root).path == path {
			return Some(root);
		}

		self.find_below(root, path)
	}

	fn find_below(&self, id: NodeId, path: &str) -> Option<NodeId> {
		for &child in &self.node(id).children {
			let node = self.node(child);
			if node.path == path {
				return Some(child);
			}

			if path.starts_with(&node.subtree_prefix()) {
				if let Some(found) = self.find_below(child, path) {
					return Some(found);
				}
			}
		}

		None
	}

	/// The node named by the root's `tag-node` header, if any.
	pub fn tag_node(&self, id: NodeId) -> UrielResult<Option<NodeId>> {
		let root = self.root_of(id);
		let Some(path) = self.node(root).try_header(headers::TAG_NODE) else {
			return Ok(None);
		};

		self.try_find_node_by_path(root, path)
			.map(Some)
			.ok_or_else(|| UrielError::TagNodeNotFound(path.to_string()))
	}

	pub fn tag_node_index(&self) -> UrielResult<&TagNodeIndex> {
		self.tag_node_index
			.as_ref()
			.ok_or(UrielError::TagNodeIndexNotSet)
	}

	pub fn set_tag_node_index(&mut self, index: TagNodeIndex) {
		self.tag_node_index = Some(index);
	}

	/// Collect the tags of every node in the tree containing `from`.
	pub fn create_tag_node_index(&self, from: NodeId) -> UrielResult<TagNodeIndex> {
		let mut index = TagNodeIndex::new();

		for id in self.descendants(self.root_of(from)) {
			for tag in self.node(id).tags()? {
				index.entry(tag).or_default().insert(id);
			}
		}

		Ok(index)
	}

	/// The synthetic node listing `tag`, once the tag tree exists.
	pub fn vnode_for_tag(&self, from: NodeId, tag: &str) -> UrielResult<Option<NodeId>> {
		let Some(tag_node) = self.tag_node(from)? else {
			return Ok(None);
		};

		let path = format!("{}{tag}", self.node(tag_node).subtree_prefix());

		Ok(self.try_find_node_by_path(tag_node, &path))
	}
}

#[derive(Debug, PartialEq, Eq)]
struct SortKey {
	created: Option<DateTime<FixedOffset>>,
	title: String,
	url: String,
}

impl Ord for SortKey {
	fn cmp(&self, other: &Self) -> Ordering {
		let created = match (self.created, other.created) {
			(Some(a), Some(b)) => b.cmp(&a),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => Ordering::Equal,
		};

		created
			.then_with(|| self.title.cmp(&other.title))
			.then_with(|| self.url.cmp(&other.url))
	}
}

impl PartialOrd for SortKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

fn node_name(path: &str) -> &str {
	if path == INDEX {
		return INDEX;
	}

	let trimmed = path.strip_suffix("/index").unwrap_or(path);
	trimmed.rsplit_once('/').map_or(trimmed, |(_, name)| name)
}

fn title_case(text: &str) -> String {
	let mut titled = String::with_capacity(text.len());
	let mut previous_cased = false;

	for ch in text.chars() {
		if previous_cased {
			titled.extend(ch.to_lowercase());
		} else {
			titled.extend(ch.to_uppercase());
		}
		previous_cased = ch.is_alphabetic();
	}

	titled
}

fn is_valid_tag(tag: &str) -> bool {
	!tag.is_empty()
		&& tag
			.chars()
			.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}
