use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum UrielError {
	#[error(transparent)]
	#[diagnostic(code(uriel::io_error))]
	Io(#[from] std::io::Error),

	#[error("invalid header directive `{key}: {value}` in node `{node}`")]
	#[diagnostic(
		code(uriel::invalid_directive),
		help("removal directives only accept `*` as a value, e.g. `{key}: *`")
	)]
	InvalidDirective {
		node: String,
		key: String,
		value: String,
	},

	#[error("invalid boolean value for header `{key}`: `{value}`")]
	#[diagnostic(code(uriel::invalid_boolean), help("use `true` or `false`"))]
	InvalidBoolean { key: String, value: String },

	#[error("invalid date: `{0}`")]
	#[diagnostic(
		code(uriel::invalid_date),
		help("use an ISO 8601 date such as `2025-08-24T17:08:37-04:00`")
	)]
	InvalidDate(String),

	#[error("invalid tag: `{0}`")]
	#[diagnostic(
		code(uriel::invalid_tag),
		help("tags may only contain lowercase letters, digits and `-`")
	)]
	InvalidTag(String),

	#[error("header `{key}` not found in node `{node}`")]
	#[diagnostic(code(uriel::header_not_found))]
	HeaderNotFound { node: String, key: String },

	#[error("node not found: `{0}`")]
	#[diagnostic(code(uriel::node_not_found))]
	NodeNotFound(String),

	#[error("tag node `{0}` could not be found")]
	#[diagnostic(
		code(uriel::tag_node_not_found),
		help("the `tag-node` header must name the path of an existing node")
	)]
	TagNodeNotFound(String),

	#[error("tag node index has not been created")]
	#[diagnostic(code(uriel::tag_node_index_not_set))]
	TagNodeIndexNotSet,

	#[error("no node found for tag `{0}`")]
	#[diagnostic(code(uriel::tag_vnode_not_found))]
	TagVirtualNodeNotFound(String),

	#[error("include loop detected in `nodes/{node}`")]
	#[diagnostic(
		code(uriel::include_loop),
		help("a template may not include itself, directly or through other templates")
	)]
	IncludeLoop { node: String, lines: Vec<String> },

	#[error("node body include loop detected in `nodes/{0}`")]
	#[diagnostic(
		code(uriel::node_body_loop),
		help("`{{{{node:body}}}}` can only be merged once per page")
	)]
	NodeBodyLoop(String),

	#[error("{reason}")]
	#[diagnostic(code(uriel::merge))]
	Merge {
		node: String,
		token: String,
		reason: String,
	},

	#[error("error in function call to 'soju.{call}': {reason}")]
	#[diagnostic(code(uriel::soju))]
	Soju { call: String, reason: String },

	#[error("template not found: `templates/{0}`")]
	#[diagnostic(code(uriel::template_not_found))]
	TemplateNotFound(String),

	#[error("pop from an empty template stack")]
	#[diagnostic(code(uriel::empty_template_stack))]
	EmptyTemplateStack,

	#[error("directory `{0}` has no `index` node")]
	#[diagnostic(
		code(uriel::missing_index),
		help("every directory under `nodes/` needs an `index` file")
	)]
	MissingIndex(String),

	#[error("duplicate url `{url}` for node `{node}`")]
	#[diagnostic(
		code(uriel::duplicate_url),
		help("two nodes resolve to the same url, check their `flat-url` headers")
	)]
	DuplicateUrl { node: String, url: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(uriel::config_parse),
		help("check that uriel.toml is valid TOML with [templates] and/or [exclude] sections")
	)]
	ConfigParse(String),

	#[error("symlink cycle detected at: `{path}`")]
	#[diagnostic(
		code(uriel::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: String },
}

pub type UrielResult<T> = Result<T, UrielError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
