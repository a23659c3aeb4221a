//! The merge engine.
//!
//! A [`Page`] renders one node: it merges the node's template line by line,
//! replacing each placeholder token with the value it names. Includes and the
//! node body are merged recursively, guarded by a [`TemplateStack`] and a
//! node body counter so neither can recurse forever.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use chrono::format::Item;
use chrono::format::StrftimeItems;

use crate::NodeTree;
use crate::Token;
use crate::TokenKind;
use crate::UrielError;
use crate::UrielResult;
use crate::headers;
use crate::html;
use crate::lexer;
use crate::log::indent_spaces;
use crate::node::Node;
use crate::node::NodeId;
use crate::node::NODES_DIR;
use crate::node::TEMPLATES_DIR;
use crate::soju::SojuArg;
use crate::soju::SojuCall;
use crate::soju::SojuError;
use crate::soju::SojuParameter;
use crate::soju::SojuRegistry;
use crate::template_stack::TemplateStack;

/// Template used when a node has no `template` header.
pub const DEFAULT_TEMPLATE: &str = "default.html";
/// Template name that renders the node body without any wrapper.
pub const NULL_TEMPLATE: &str = "null";

const TEXT_FORMAT: &str = "text";
const ALL: &str = "*";
const RSS_VALUE: &str = "url";
const PARAMETER_ERROR: &str = "parameter error:";
const NODE_BODY_LOOP_ERROR: &str = "node body include loop error:";
const TEMPLATE_ERROR: &str = "template error:";

/// Rendering context for a single node.
pub struct Page<'a> {
	tree: &'a NodeTree,
	node: NodeId,
	use_canonical_url: bool,
	soju: Option<&'a SojuRegistry>,
	default_template: String,
	pub(crate) template_stack: TemplateStack,
	pub(crate) node_body_semaphore: usize,
	/// Stack depth at which the current node body merge started.
	node_body_depth: Option<usize>,
	/// Set once a raised error has been logged so it is reported only once.
	error_reported: bool,
}

impl<'a> Page<'a> {
	pub fn new(tree: &'a NodeTree, node: NodeId, use_canonical_url: bool) -> Self {
		Self {
			tree,
			node,
			use_canonical_url,
			soju: None,
			default_template: DEFAULT_TEMPLATE.to_string(),
			template_stack: TemplateStack::new(),
			node_body_semaphore: 0,
			node_body_depth: None,
			error_reported: false,
		}
	}

	#[must_use]
	pub fn with_soju(mut self, registry: &'a SojuRegistry) -> Self {
		self.soju = Some(registry);
		self
	}

	#[must_use]
	pub fn with_default_template(mut self, template: impl Into<String>) -> Self {
		self.default_template = template.into();
		self
	}

	pub fn tree(&self) -> &'a NodeTree {
		self.tree
	}

	pub fn node_id(&self) -> NodeId {
		self.node
	}

	pub fn node(&self) -> &'a Node {
		self.tree.node(self.node)
	}

	pub fn use_canonical_url(&self) -> bool {
		self.use_canonical_url
	}

	pub fn project_root(&self) -> &'a Path {
		self.tree.project_root()
	}

	pub fn template_stack(&self) -> &TemplateStack {
		&self.template_stack
	}

	pub fn tokenize(&self, text: &str) -> Vec<Token> {
		lexer::tokenize(text)
	}

	/// Log a diagnostic for `token` including `reason`, without failing.
	pub fn report_line_error(&mut self, token: &Token, reason: &str) {
		self.log_context(PARAMETER_ERROR, token, Some(reason), false);
	}

	/// Log a diagnostic for `token` and build the error to raise. Only the
	/// first raised error of a page is logged.
	pub fn line_error(&mut self, token: &Token, reason: &str) -> UrielError {
		if !self.error_reported {
			self.log_context(PARAMETER_ERROR, token, None, false);
			self.error_reported = true;
		}

		UrielError::Merge {
			node: self.node().path().to_string(),
			token: token.original().to_string(),
			reason: reason.to_string(),
		}
	}

	/// Log and build the error for a `{{node:body}}` reached while the node
	/// body is already being merged.
	pub fn node_body_loop_error(&mut self, token: &Token) -> UrielError {
		if !self.error_reported {
			self.log_context(NODE_BODY_LOOP_ERROR, token, None, true);
			self.error_reported = true;
		}

		UrielError::NodeBodyLoop(self.node().path().to_string())
	}

	fn log_context(&self, header: &str, token: &Token, reason: Option<&str>, in_node_body: bool) {
		let sink = self.tree.sink();
		let path = self.node().path();
		sink.error(header);
		sink.error(&format!("{}{NODES_DIR}/{path}", indent_spaces(1)));

		let mut level = 2;
		if self.template_stack.has_more_elements() {
			for frame in self.template_stack.frames() {
				sink.error(&format!(
					"{}{TEMPLATES_DIR}/{}",
					indent_spaces(2),
					frame.template
				));
			}
			level = 3;

			if in_node_body || self.node_body_semaphore > 0 {
				sink.error(&format!("{}{NODES_DIR}/{path}", indent_spaces(3)));
				level = 4;
			}
		}

		sink.error(&format!("{}'{}'", indent_spaces(level), token.original()));
		if let Some(reason) = reason {
			sink.error(&format!("{}{reason}", indent_spaces(level + 1)));
		}
	}

	fn push_template(&mut self, template: &str) -> UrielResult<()> {
		let node_body = self.node_body_depth == Some(self.template_stack.len());
		let pushed = self
			.template_stack
			.push(template, self.node().path(), node_body);

		if let Err(UrielError::IncludeLoop { lines, .. }) = &pushed {
			if !self.error_reported {
				for line in lines {
					self.tree.sink().error(line);
				}
			}
			self.error_reported = true;
		}

		pushed
	}

	/// The ancestors of the node, root excluded, as links joined by the
	/// breadcrumb separator.
	pub fn create_breadcrumbs(&self) -> UrielResult<String> {
		let separator = self.node().breadcrumb_separator()?;
		let links = self
			.tree
			.ancestors(self.node)
			.into_iter()
			.skip(1)
			.map(|id| self.get_node_link(id))
			.collect::<UrielResult<Vec<_>>>()?;

		Ok(links.join(&separator))
	}

	pub fn get_node_by_path(&mut self, token: &Token, path: &str) -> UrielResult<NodeId> {
		match self.tree.try_find_node_by_path(self.node, path) {
			Some(id) => Ok(id),
			None => Err(self.line_error(token, &format!("node '{path}' not found"))),
		}
	}

	pub fn get_node_url(&self, id: NodeId) -> UrielResult<String> {
		self.tree.url_for(id, self.use_canonical_url)
	}

	pub fn get_node_link(&self, id: NodeId) -> UrielResult<String> {
		self.tree.link_for(id, self.use_canonical_url)
	}

	/// `path` as is, or prefixed with the canonical url in canonical mode.
	pub fn get_static_url(&self, id: NodeId, path: &str) -> UrielResult<String> {
		if !self.use_canonical_url {
			return Ok(path.to_string());
		}

		let base = self.tree.site_header(id, headers::CANONICAL_URL)?;

		Ok(format!(
			"{}/{}",
			base.trim_end_matches('/'),
			path.trim_start_matches('/')
		))
	}

	/// Resolve `path` inside `public/`, refusing anything that climbs out.
	pub fn get_static_url_abspath(&mut self, token: &Token, path: &str) -> UrielResult<PathBuf> {
		let segments = self.static_segments(token, path)?;
		let mut resolved = self.tree.public_dir();
		resolved.extend(segments);

		Ok(resolved)
	}

	/// The segments of `path` with `.`, `..` and empty segments resolved.
	fn static_segments<'p>(&mut self, token: &Token, path: &'p str) -> UrielResult<Vec<&'p str>> {
		let mut segments: Vec<&str> = Vec::new();

		for segment in path.split('/') {
			match segment {
				"" | "." => {}
				".." => {
					if segments.pop().is_none() {
						return Err(self.line_error(token, "directory traversal is not allowed"));
					}
				}
				segment => segments.push(segment),
			}
		}

		if segments.is_empty() {
			return Err(self.line_error(token, "path does not name a file"));
		}

		Ok(segments)
	}

	/// The header `key`, or its canonical variant in canonical mode.
	pub fn get_maybe_canonical_html_fragment(&self, id: NodeId, key: &str) -> UrielResult<String> {
		let key = headers::fragment_key(key, self.use_canonical_url);

		self.tree.node(id).header(&key).map(ToString::to_string)
	}

	pub fn merge_token(&mut self, token: &Token) -> UrielResult<String> {
		match token.kind() {
			TokenKind::Literal => self.merge_token_literal(token),
			TokenKind::Value => self.merge_token_value(token),
			TokenKind::ValueUnescaped => self.merge_token_value_unescaped(token),
			TokenKind::Include => self.merge_token_include(token),
			TokenKind::Breadcrumbs => self.merge_token_breadcrumbs(token),
			TokenKind::Created => self.merge_token_created(token),
			TokenKind::Modified => self.merge_token_modified(token),
			TokenKind::StaticUrl => self.merge_token_static_url(token),
			TokenKind::StaticHashUrl => self.merge_token_static_hash_url(token),
			TokenKind::Rss => self.merge_token_rss(token),
			TokenKind::Node => self.merge_token_node(token),
			TokenKind::NodeUrl => self.merge_token_node_url(token),
			TokenKind::NodeName => self.merge_token_node_name(token),
			TokenKind::NodeTitle => self.merge_token_node_title(token),
			TokenKind::NodeLink => self.merge_token_node_link(token),
			TokenKind::NodeList => self.merge_token_node_list(token),
			TokenKind::TagList => self.merge_token_tag_list(token),
			TokenKind::Soju => self.merge_token_soju(token),
		}
	}

	pub fn merge_token_literal(&mut self, token: &Token) -> UrielResult<String> {
		if token.has_unidentified_parameter() {
			return Err(self.line_error(token, "unidentified parameter"));
		}

		Ok(token.value().to_string())
	}

	pub fn merge_token_value(&mut self, token: &Token) -> UrielResult<String> {
		self.merge_token_value_unescaped(token)
			.map(|value| html::escape(&value))
	}

	pub fn merge_token_value_unescaped(&mut self, token: &Token) -> UrielResult<String> {
		match self.node().try_header(token.value()) {
			Some(value) => Ok(value.to_string()),
			None => {
				let reason = format!("header '{}' is not set", token.value());
				Err(self.line_error(token, &reason))
			}
		}
	}

	pub fn merge_token_include(&mut self, token: &Token) -> UrielResult<String> {
		let template = token.value();
		let Some(path) = self.template_file(template) else {
			let reason = format!("template '{template}' not found");
			return Err(self.line_error(token, &reason));
		};

		let text = match fs::read_to_string(&path) {
			Ok(text) => text,
			Err(error) => {
				let reason = format!("template '{template}' could not be read: {error}");
				return Err(self.line_error(token, &reason));
			}
		};

		self.merge_template_text(template, &text)
	}

	/// Log a diagnostic for a page template that cannot be merged. Shares the
	/// once-per-page latch with [`Page::line_error`].
	fn template_error(&mut self, template: &str, reason: &str) {
		if self.error_reported {
			return;
		}

		let sink = self.tree.sink();
		sink.error(TEMPLATE_ERROR);
		sink.error(&format!("{}{NODES_DIR}/{}", indent_spaces(1), self.node().path()));
		sink.error(&format!("{}{TEMPLATES_DIR}/{template}", indent_spaces(2)));
		sink.error(&format!("{}{reason}", indent_spaces(3)));
		self.error_reported = true;
	}

	fn template_file(&self, template: &str) -> Option<PathBuf> {
		let invalid = template.is_empty()
			|| template
				.split(['/', '\\'])
				.any(|segment| segment == "..");
		if invalid {
			return None;
		}

		let path = self.tree.templates_dir().join(template);
		path.is_file().then_some(path)
	}

	fn merge_template_text(&mut self, template: &str, text: &str) -> UrielResult<String> {
		self.push_template(template)?;
		let merged = self.merge_lines(text.lines());
		let popped = self.template_stack.pop();
		let merged = merged?;
		popped?;

		Ok(merged)
	}

	pub fn merge_token_created(&mut self, token: &Token) -> UrielResult<String> {
		match self.node().created() {
			Some(created) => self.format_timestamp(token, &created),
			None => Err(self.line_error(token, "created date is not set")),
		}
	}

	pub fn merge_token_modified(&mut self, token: &Token) -> UrielResult<String> {
		match self.node().modified() {
			Some(modified) => self.format_timestamp(token, &modified),
			None => Err(self.line_error(token, "modified date is not set")),
		}
	}

	fn format_timestamp(
		&mut self,
		token: &Token,
		timestamp: &chrono::DateTime<chrono::FixedOffset>,
	) -> UrielResult<String> {
		let items: Vec<Item<'_>> = StrftimeItems::new(token.value()).collect();
		if items.iter().any(|item| matches!(item, Item::Error)) {
			return Err(self.line_error(token, "invalid date format"));
		}

		let formatted = timestamp.format_with_items(items.iter()).to_string();

		Ok(html::escape(&formatted))
	}

	pub fn merge_token_breadcrumbs(&mut self, token: &Token) -> UrielResult<String> {
		if token.value() != ALL {
			return Err(self.line_error(token, "breadcrumbs value must be '*'"));
		}

		self.create_breadcrumbs()
	}

	pub fn merge_token_static_url(&mut self, token: &Token) -> UrielResult<String> {
		let path = self.get_static_url_abspath(token, token.value())?;
		if !path.is_file() {
			return Err(self.line_error(token, "file not found"));
		}

		self.get_static_url(self.node, token.value())
	}

	/// Copy the file to a name derived from the md5 of its contents, once,
	/// and return the url of the copy.
	pub fn merge_token_static_hash_url(&mut self, token: &Token) -> UrielResult<String> {
		let segments = self.static_segments(token, token.value())?;
		let mut path = self.tree.public_dir();
		path.extend(&segments);
		if !path.is_file() {
			return Err(self.line_error(token, "file not found"));
		}

		let digest = md5::compute(fs::read(&path)?);
		let extension = path
			.extension()
			.and_then(|extension| extension.to_str())
			.map(|extension| format!(".{extension}"))
			.unwrap_or_default();
		let hashed_name = format!("{digest:x}{extension}");

		let hashed_path = path.with_file_name(&hashed_name);
		if !hashed_path.exists() {
			fs::copy(&path, &hashed_path)?;
		}

		let prefix = if token.value().starts_with('/') { "/" } else { "" };
		let directory: String = segments[..segments.len() - 1]
			.iter()
			.map(|segment| format!("{segment}/"))
			.collect();
		let url = format!("{prefix}{directory}{hashed_name}");

		self.get_static_url(self.node, &url)
	}

	pub fn merge_token_rss(&mut self, token: &Token) -> UrielResult<String> {
		if token.value() != RSS_VALUE {
			return Err(self.line_error(token, "rss value must be 'url'"));
		}

		let Ok(canonical_url) = self.tree.site_header(self.node, headers::CANONICAL_URL) else {
			return Err(self.line_error(token, "header 'canonical-url' is not set"));
		};
		let Ok(rss_url) = self.tree.site_header(self.node, headers::RSS_URL) else {
			return Err(self.line_error(token, "header 'rss-url' is not set"));
		};

		Ok(format!("{canonical_url}{rss_url}"))
	}

	pub fn merge_token_node(&mut self, token: &Token) -> UrielResult<String> {
		match token.value() {
			"body" => self.merge_node_body(token),
			"url" => self.get_node_url(self.node),
			"name" => Ok(self.node().name().to_string()),
			"title" => self.node().escaped_title(),
			"link" => self.get_node_link(self.node),
			value => {
				let reason = format!("unknown node value '{value}'");
				Err(self.line_error(token, &reason))
			}
		}
	}

	/// Merge the raw node body through the full pipeline.
	pub fn merge_node_body(&mut self, token: &Token) -> UrielResult<String> {
		if self.node_body_semaphore > 0 {
			return Err(self.node_body_loop_error(token));
		}

		self.node_body_semaphore += 1;
		let depth = self.node_body_depth.replace(self.template_stack.len());
		let merged = self.merge_node_body_text();
		self.node_body_depth = depth;
		self.node_body_semaphore -= 1;

		merged
	}

	fn merge_node_body_text(&mut self) -> UrielResult<String> {
		let body = self.node().body().unwrap_or_default();
		let merged = self.merge_multiline(body)?;

		if self.node().try_header(headers::FORMAT) == Some(TEXT_FORMAT) {
			Ok(html::text_to_html(&merged))
		} else {
			Ok(merged)
		}
	}

	pub fn merge_token_node_url(&mut self, token: &Token) -> UrielResult<String> {
		let id = self.get_node_by_path(token, token.value())?;
		self.get_node_url(id)
	}

	pub fn merge_token_node_name(&mut self, token: &Token) -> UrielResult<String> {
		let id = self.get_node_by_path(token, token.value())?;
		Ok(self.tree.node(id).name().to_string())
	}

	pub fn merge_token_node_title(&mut self, token: &Token) -> UrielResult<String> {
		let id = self.get_node_by_path(token, token.value())?;
		self.tree.node(id).escaped_title()
	}

	pub fn merge_token_node_link(&mut self, token: &Token) -> UrielResult<String> {
		let id = self.get_node_by_path(token, token.value())?;
		self.get_node_link(id)
	}

	/// A missing list propagates as [`UrielError::HeaderNotFound`].
	pub fn merge_token_node_list(&mut self, token: &Token) -> UrielResult<String> {
		if token.value() != ALL {
			return Err(self.line_error(token, "node-list value must be '*'"));
		}

		self.get_maybe_canonical_html_fragment(self.node, headers::NODE_LIST_HTML)
	}

	pub fn merge_token_tag_list(&mut self, token: &Token) -> UrielResult<String> {
		if token.value() != ALL {
			return Err(self.line_error(token, "tag-list value must be '*'"));
		}

		match self.get_maybe_canonical_html_fragment(self.node, headers::TAG_LIST_HTML) {
			Ok(fragment) => Ok(fragment),
			Err(_) => Err(self.line_error(token, "tag list is not available for this node")),
		}
	}

	pub fn merge_token_soju(&mut self, token: &Token) -> UrielResult<String> {
		let call = match SojuCall::parse(token.value()) {
			Ok(call) => call,
			Err(reason) => return Err(self.line_error(token, &reason)),
		};

		let Some(registry) = self.soju.filter(|registry| registry.contains(&call.name)) else {
			let reason = format!("soju function '{}' not found", call.name);
			return Err(self.line_error(token, &reason));
		};

		match self.get_soju_result(registry, &call) {
			Some(Ok(value)) => Ok(value),
			Some(Err(error)) => Err(self.soju_error(token, &error)),
			None => {
				let reason = format!("soju function '{}' not found", call.name);
				Err(self.line_error(token, &reason))
			}
		}
	}

	/// Invoke the function named by `call` with the requested context values.
	pub fn get_soju_result(
		&self,
		registry: &SojuRegistry,
		call: &SojuCall,
	) -> Option<Result<String, SojuError>> {
		let args: Vec<SojuArg<'_, 'a>> = call
			.parameters
			.iter()
			.map(|parameter| {
				match parameter {
					SojuParameter::Page => SojuArg::Page(self),
					SojuParameter::Node => SojuArg::Node(self.node()),
					SojuParameter::ProjectRoot => SojuArg::ProjectRoot(self.project_root()),
					SojuParameter::UseCanonicalUrl => SojuArg::UseCanonicalUrl(self.use_canonical_url),
				}
			})
			.collect();

		registry.invoke(&call.name, &args)
	}

	fn soju_error(&mut self, token: &Token, error: &SojuError) -> UrielError {
		let reason = match error {
			SojuError::Declined { reason: Some(reason) } => format!("'{reason}'"),
			SojuError::Declined { reason: None } => "SojuError".to_string(),
			SojuError::Failed(source) => {
				let message = source.to_string();
				if message.is_empty() {
					"SojuFailure".to_string()
				} else {
					format!("'{message}'")
				}
			}
		};

		if !self.error_reported {
			self.report_line_error(token, &reason);

			if let SojuError::Failed(source) = error {
				let sink = self.tree.sink();
				sink.error("error source chain:");
				let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(source.as_ref());
				let mut index = 0;
				while let Some(current) = cause {
					sink.error(&format!("{}{index}: {current}", indent_spaces(1)));
					cause = current.source();
					index += 1;
				}
			}
			self.error_reported = true;
		}

		UrielError::Soju {
			call: token.value().to_string(),
			reason,
		}
	}

	pub fn merge_line(&mut self, line: &str) -> UrielResult<String> {
		let mut merged = String::with_capacity(line.len());
		for token in self.tokenize(line) {
			merged.push_str(&self.merge_token(&token)?);
		}

		Ok(merged)
	}

	pub fn merge_lines<'l>(&mut self, lines: impl IntoIterator<Item = &'l str>) -> UrielResult<String> {
		let merged = lines
			.into_iter()
			.map(|line| self.merge_line(line))
			.collect::<UrielResult<Vec<_>>>()?;

		Ok(merged.join("\n"))
	}

	/// Merge text line by line, keeping every line break including a trailing
	/// one.
	pub fn merge_multiline(&mut self, text: &str) -> UrielResult<String> {
		self.merge_lines(text.split('\n'))
	}

	/// Merge `templates/<template>`. [`NULL_TEMPLATE`] merges the node body
	/// on its own.
	pub fn merge_template(&mut self, template: &str) -> UrielResult<String> {
		if template == NULL_TEMPLATE {
			return self.merge_node_body(&Token::new("{{node:body}}"));
		}

		let Some(path) = self.template_file(template) else {
			self.template_error(template, "not found");
			return Err(UrielError::TemplateNotFound(template.to_string()));
		};

		let text = match fs::read_to_string(&path) {
			Ok(text) => text,
			Err(error) => {
				self.template_error(template, &error.to_string());
				return Err(error.into());
			}
		};

		self.merge_template_text(template, &text)
	}

	/// Render the node with its `template` header or the default template.
	pub fn render(&mut self) -> UrielResult<String> {
		let template = self
			.node()
			.try_header(headers::TEMPLATE)
			.map_or_else(|| self.default_template.clone(), ToString::to_string);

		Ok(format!("{}\n", self.merge_template(&template)?))
	}
}
