use std::fmt;

const OPEN_DELIMITER: &str = "{{";
const CLOSE_DELIMITER: &str = "}}";

/// The kind of a template token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
	Literal,
	Value,
	ValueUnescaped,
	Include,
	Breadcrumbs,
	Created,
	Modified,
	StaticUrl,
	StaticHashUrl,
	Rss,
	Node,
	NodeUrl,
	NodeName,
	NodeTitle,
	NodeLink,
	NodeList,
	TagList,
	Soju,
}

impl TokenKind {
	/// The placeholder types that may appear before the `:` in `{{type:value}}`.
	pub const PLACEHOLDERS: [TokenKind; 17] = [
		Self::Value,
		Self::ValueUnescaped,
		Self::Include,
		Self::Breadcrumbs,
		Self::Created,
		Self::Modified,
		Self::StaticUrl,
		Self::StaticHashUrl,
		Self::Rss,
		Self::Node,
		Self::NodeUrl,
		Self::NodeName,
		Self::NodeTitle,
		Self::NodeLink,
		Self::NodeList,
		Self::TagList,
		Self::Soju,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Literal => "literal",
			Self::Value => "value",
			Self::ValueUnescaped => "value-unescaped",
			Self::Include => "include",
			Self::Breadcrumbs => "breadcrumbs",
			Self::Created => "created",
			Self::Modified => "modified",
			Self::StaticUrl => "static-url",
			Self::StaticHashUrl => "static-hash-url",
			Self::Rss => "rss",
			Self::Node => "node",
			Self::NodeUrl => "node-url",
			Self::NodeName => "node-name",
			Self::NodeTitle => "node-title",
			Self::NodeLink => "node-link",
			Self::NodeList => "node-list",
			Self::TagList => "tag-list",
			Self::Soju => "soju",
		}
	}

	fn from_placeholder(name: &str) -> Option<Self> {
		Self::PLACEHOLDERS
			.into_iter()
			.find(|kind| kind.as_str() == name)
	}
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One unit of template text: either a literal run or a `{{type:value}}`
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	original: String,
	kind: TokenKind,
	value: String,
	unidentified_parameter: bool,
}

impl Token {
	/// Classify `text`.
	///
	/// The delimiters must sit at the very start and end of `text`. Whitespace
	/// inside them is trimmed, whitespace outside turns the whole text into a
	/// literal. A delimited text with no `:` or an unknown type is a literal
	/// flagged with an unidentified parameter.
	pub fn new(text: &str) -> Self {
		let literal = |unidentified_parameter| {
			Self {
				original: text.to_string(),
				kind: TokenKind::Literal,
				value: text.to_string(),
				unidentified_parameter,
			}
		};

		let Some(inner) = text
			.strip_prefix(OPEN_DELIMITER)
			.and_then(|rest| rest.strip_suffix(CLOSE_DELIMITER))
		else {
			return literal(false);
		};

		let Some((name, value)) = inner.split_once(':') else {
			return literal(true);
		};

		match TokenKind::from_placeholder(name.trim()) {
			Some(kind) => {
				Self {
					original: text.to_string(),
					kind,
					value: value.trim().to_string(),
					unidentified_parameter: false,
				}
			}
			None => literal(true),
		}
	}

	/// The exact text this token was created from.
	pub fn original(&self) -> &str {
		&self.original
	}

	pub fn kind(&self) -> TokenKind {
		self.kind
	}

	/// The trimmed payload after the `:`, or the literal text.
	pub fn value(&self) -> &str {
		&self.value
	}

	pub fn has_unidentified_parameter(&self) -> bool {
		self.unidentified_parameter
	}
}

impl From<&str> for Token {
	fn from(text: &str) -> Self {
		Self::new(text)
	}
}
