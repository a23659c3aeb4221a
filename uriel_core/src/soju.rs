//! User supplied functions callable from templates as
//! `{{soju:name(args)}}`.
//!
//! Functions are registered by name on a [`SojuRegistry`] and receive the
//! arguments named in the call, drawn from a fixed set of page context values.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::Node;
use crate::Page;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A registered function.
pub type SojuFn = Box<dyn Fn(&[SojuArg<'_, '_>]) -> Result<String, SojuError>>;

/// Errors a soju function may return.
#[derive(Debug, Error)]
pub enum SojuError {
	/// The function refused to produce a value.
	#[error("{}", .reason.as_deref().unwrap_or("SojuError"))]
	Declined { reason: Option<String> },

	/// The function failed unexpectedly.
	#[error("{0}")]
	Failed(#[source] BoxError),
}

impl SojuError {
	pub fn declined(reason: impl Into<String>) -> Self {
		Self::Declined {
			reason: Some(reason.into()),
		}
	}

	pub fn failed(source: impl Into<BoxError>) -> Self {
		Self::Failed(source.into())
	}
}

/// A value passed to a soju function.
pub enum SojuArg<'p, 'a> {
	Page(&'p Page<'a>),
	Node(&'a Node),
	ProjectRoot(&'a Path),
	UseCanonicalUrl(bool),
}

impl fmt::Debug for SojuArg<'_, '_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Page(page) => f.debug_tuple("Page").field(&page.node().path()).finish(),
			Self::Node(node) => f.debug_tuple("Node").field(&node.path()).finish(),
			Self::ProjectRoot(path) => f.debug_tuple("ProjectRoot").field(path).finish(),
			Self::UseCanonicalUrl(value) => f.debug_tuple("UseCanonicalUrl").field(value).finish(),
		}
	}
}

/// The argument names a call may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SojuParameter {
	Page,
	Node,
	ProjectRoot,
	UseCanonicalUrl,
}

impl SojuParameter {
	fn parse(name: &str) -> Option<Self> {
		match name {
			"page" => Some(Self::Page),
			"node" => Some(Self::Node),
			"project_root" => Some(Self::ProjectRoot),
			"use_canonical_url" => Some(Self::UseCanonicalUrl),
			_ => None,
		}
	}
}

/// A parsed `name(arg, ...)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SojuCall {
	pub name: String,
	pub parameters: Vec<SojuParameter>,
}

impl SojuCall {
	/// Parse the value of a `soju` token. Returns the reason on failure.
	pub fn parse(expression: &str) -> Result<Self, String> {
		let expression = expression.trim();
		let Some((name, rest)) = expression.split_once('(') else {
			return Err(format!("expected a function call, found '{expression}'"));
		};
		let Some(arguments) = rest.strip_suffix(')') else {
			return Err(format!("missing ')' in '{expression}'"));
		};

		let name = name.trim();
		if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
			return Err(format!("invalid function name '{name}'"));
		}

		let parameters = arguments
			.split(',')
			.map(str::trim)
			.filter(|argument| !argument.is_empty())
			.map(|argument| {
				SojuParameter::parse(argument).ok_or_else(|| format!("unknown argument '{argument}'"))
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self {
			name: name.to_string(),
			parameters,
		})
	}
}

/// Named soju functions.
#[derive(Default)]
pub struct SojuRegistry {
	functions: HashMap<String, SojuFn>,
}

impl fmt::Debug for SojuRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.functions.keys().collect();
		names.sort();
		f.debug_struct("SojuRegistry")
			.field("functions", &names)
			.finish()
	}
}

impl SojuRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding the built-in functions:
	///
	/// - `url(page)`: the url of the page being rendered.
	/// - `path(node)`: the node's path below `nodes/`.
	/// - `name(node)`: the last segment of the node's path.
	/// - `modified(node)`: the modified timestamp in RFC 3339 form.
	pub fn with_builtins() -> Self {
		let mut registry = Self::new();
		registry.register("url", |args| {
			match args {
				[SojuArg::Page(page)] => page.get_node_url(page.node_id()).map_err(SojuError::failed),
				_ => Err(unexpected_arguments("url(page)")),
			}
		});
		registry.register("path", |args| {
			match args {
				[SojuArg::Node(node)] => Ok(node.path().to_string()),
				_ => Err(unexpected_arguments("path(node)")),
			}
		});
		registry.register("name", |args| {
			match args {
				[SojuArg::Node(node)] => Ok(node.name().to_string()),
				_ => Err(unexpected_arguments("name(node)")),
			}
		});
		registry.register("modified", |args| {
			match args {
				[SojuArg::Node(node)] => {
					node.modified()
						.map(|modified| modified.to_rfc3339())
						.ok_or_else(|| SojuError::declined("modified date is not set"))
				}
				_ => Err(unexpected_arguments("modified(node)")),
			}
		});

		registry
	}

	pub fn register<F>(&mut self, name: impl Into<String>, function: F)
	where
		F: Fn(&[SojuArg<'_, '_>]) -> Result<String, SojuError> + 'static,
	{
		self.functions.insert(name.into(), Box::new(function));
	}

	pub fn contains(&self, name: &str) -> bool {
		self.functions.contains_key(name)
	}

	/// Call `name` with `args`. `None` when no such function is registered.
	pub fn invoke(&self, name: &str, args: &[SojuArg<'_, '_>]) -> Option<Result<String, SojuError>> {
		self.functions.get(name).map(|function| function(args))
	}
}

fn unexpected_arguments(signature: &str) -> SojuError {
	SojuError::declined(format!("expected {signature}"))
}
