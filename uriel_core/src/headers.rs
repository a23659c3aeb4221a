use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use indexmap::IndexMap;

use crate::UrielError;
use crate::UrielResult;

pub const TITLE: &str = "title";
pub const CREATED: &str = "created";
pub const MODIFIED: &str = "modified";
pub const TEMPLATE: &str = "template";
pub const FORMAT: &str = "format";
pub const TAGS: &str = "tags";
pub const TAG_NODE: &str = "tag-node";
pub const FLAT_URL: &str = "flat-url";
pub const ESCAPE_TITLE: &str = "escape-title";
pub const CANONICAL_URL: &str = "canonical-url";
pub const RSS_URL: &str = "rss-url";
pub const LINK_PREFIX: &str = "link-prefix";
pub const LINK_SUFFIX: &str = "link-suffix";
pub const BREADCRUMB_SEPARATOR: &str = "breadcrumb-separator";
pub const BREADCRUMB_SEPARATOR_SPACES: &str = "breadcrumb-separator-spaces";
pub const NODE_LIST_HTML: &str = "__node-list-html";
pub const TAG_LIST_HTML: &str = "__tag-list-html";

/// Suffix of the canonical variant of a synthetic html fragment header.
pub const CANONICAL_SUFFIX: &str = "-canonical";

/// The synthetic header holding `key`'s fragment for the given url mode.
pub fn fragment_key(key: &str, canonical: bool) -> String {
	if canonical {
		format!("{key}{CANONICAL_SUFFIX}")
	} else {
		key.to_string()
	}
}

/// Headers a child never receives from its parent.
const NEVER_INHERITED: [&str; 3] = [TITLE, CREATED, MODIFIED];

const INHERIT_PREFIX: char = '+';
const REMOVE_PREFIX: char = '-';
const REMOVE_ALL: &str = "*";

const OFFSET_FORMATS: [&str; 4] = [
	"%Y-%m-%dT%H:%M:%S%.f%:z",
	"%Y-%m-%d %H:%M:%S%.f%:z",
	"%Y-%m-%dT%H:%M:%S%.f%z",
	"%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 4] = [
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M",
	"%Y-%m-%d %H:%M",
];

/// The header mapping of a node.
///
/// Keys are case-insensitive and stored lowercased. Iteration follows
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(IndexMap<String, String>);

impl Headers {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(&key.to_lowercase()).map(String::as_str)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(&key.to_lowercase())
	}

	/// Insert or overwrite a header, returning the previous value.
	pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.to_lowercase(), value.into())
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		self.0.shift_remove(&key.to_lowercase())
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compute the headers a child of `node` starts with.
	///
	/// Everything except the identity headers is copied. Then every `+key`
	/// loses one leading character and overwrites what it lands on. Finally
	/// every `-key` must carry `*` and removes both itself and the key with one
	/// leading character stripped. Both passes read a snapshot of the keys so
	/// each prefix character is consumed once per generation.
	pub fn inherit(&self, node: &str) -> UrielResult<Headers> {
		let mut inherited = self.clone();
		for key in NEVER_INHERITED {
			inherited.remove(key);
		}

		let additive: Vec<String> = inherited
			.0
			.keys()
			.filter(|key| key.starts_with(INHERIT_PREFIX))
			.cloned()
			.collect();

		for key in additive {
			if let Some(value) = inherited.0.shift_remove(&key) {
				inherited.0.insert(strip_first_char(&key).to_string(), value);
			}
		}

		let removals: Vec<(String, String)> = inherited
			.0
			.iter()
			.filter(|(key, _)| key.starts_with(REMOVE_PREFIX))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();

		for (key, value) in removals {
			validate_removal(node, &key, &value)?;
			inherited.0.shift_remove(&key);
			inherited.0.shift_remove(strip_first_char(&key));
		}

		Ok(inherited)
	}

	/// Apply a `-key: *` line read from a node's own file: the target is
	/// removed from the inherited headers and the directive is kept so it
	/// reaches the next generation too.
	pub(crate) fn apply_own_removal(
		&mut self,
		node: &str,
		key: &str,
		value: &str,
	) -> UrielResult<()> {
		validate_removal(node, key, value)?;
		self.remove(strip_first_char(key));
		self.insert(key, value);

		Ok(())
	}
}

fn strip_first_char(key: &str) -> &str {
	let mut chars = key.chars();
	chars.next();
	chars.as_str()
}

fn validate_removal(node: &str, key: &str, value: &str) -> UrielResult<()> {
	if value == REMOVE_ALL {
		return Ok(());
	}

	Err(UrielError::InvalidDirective {
		node: node.to_string(),
		key: key.to_string(),
		value: value.to_string(),
	})
}

/// Interpret an optional header value as a boolean.
pub fn parse_boolean(key: &str, value: Option<&str>, default: bool) -> UrielResult<bool> {
	let Some(value) = value else {
		return Ok(default);
	};

	match value.trim().to_lowercase().as_str() {
		"true" => Ok(true),
		"false" => Ok(false),
		_ => {
			Err(UrielError::InvalidBoolean {
				key: key.to_string(),
				value: value.to_string(),
			})
		}
	}
}

/// Parse an ISO 8601 style timestamp. Values without an offset are taken to
/// be in the local timezone.
pub fn parse_datetime(value: &str) -> UrielResult<DateTime<FixedOffset>> {
	let value = value.trim();

	if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
		return Ok(datetime);
	}

	for format in OFFSET_FORMATS {
		if let Ok(datetime) = DateTime::parse_from_str(value, format) {
			return Ok(datetime);
		}
	}

	let naive = NAIVE_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
		.or_else(|| {
			NaiveDate::parse_from_str(value, "%Y-%m-%d")
				.ok()
				.and_then(|date| date.and_hms_opt(0, 0, 0))
		})
		.ok_or_else(|| UrielError::InvalidDate(value.to_string()))?;

	Local
		.from_local_datetime(&naive)
		.earliest()
		.map(|datetime| datetime.fixed_offset())
		.ok_or_else(|| UrielError::InvalidDate(value.to_string()))
}

/// Split the text of a node file into its header lines and its body.
///
/// Headers are `key: value` lines at the top of the file, with optional
/// leading `+`/`-` characters on the key. The block ends at the first line
/// that is not a header; a blank line ending a non-empty block is dropped.
pub(crate) fn split_source(text: &str) -> (Vec<(String, String)>, String) {
	let mut headers = Vec::new();
	let mut lines = text.lines().peekable();

	while let Some(&line) = lines.peek() {
		let Some((key, value)) = parse_header_line(line) else {
			break;
		};

		headers.push((key.to_lowercase(), value.trim().to_string()));
		lines.next();
	}

	if !headers.is_empty() && lines.peek().is_some_and(|line| line.trim().is_empty()) {
		lines.next();
	}

	let body = lines.collect::<Vec<_>>().join("\n");

	(headers, body)
}

fn parse_header_line(line: &str) -> Option<(&str, &str)> {
	let (key, value) = line.split_once(':')?;
	let name = key.trim_start_matches([INHERIT_PREFIX, REMOVE_PREFIX]);

	let valid = !name.is_empty()
		&& name
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');

	valid.then_some((key, value))
}

pub(crate) fn is_removal_directive(key: &str) -> bool {
	key.starts_with(REMOVE_PREFIX)
}
