//! Line oriented diagnostic output.
//!
//! Merge errors, include loops and the output table written by
//! [`write_dynamic_nodes`](crate::project::write_dynamic_nodes) are reported
//! one line at a time through a [`LogSink`]. The default sink forwards each
//! line to [`tracing`], while [`MemorySink`] keeps them around for
//! inspection.

use std::cell::RefCell;
use std::rc::Rc;

/// Receives diagnostic lines.
pub trait LogSink {
	fn error(&self, line: &str);
	fn info(&self, line: &str);
}

/// Forwards every line to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
	fn error(&self, line: &str) {
		tracing::error!("{line}");
	}

	fn info(&self, line: &str) {
		tracing::info!("{line}");
	}
}

/// Collects lines in memory. Clones share the same buffers.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
	errors: Rc<RefCell<Vec<String>>>,
	infos: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every line passed to [`LogSink::error`] so far.
	pub fn errors(&self) -> Vec<String> {
		self.errors.borrow().clone()
	}

	/// Every line passed to [`LogSink::info`] so far.
	pub fn infos(&self) -> Vec<String> {
		self.infos.borrow().clone()
	}

	pub fn clear(&self) {
		self.errors.borrow_mut().clear();
		self.infos.borrow_mut().clear();
	}
}

impl LogSink for MemorySink {
	fn error(&self, line: &str) {
		self.errors.borrow_mut().push(line.to_string());
	}

	fn info(&self, line: &str) {
		self.infos.borrow_mut().push(line.to_string());
	}
}

/// Two spaces per indentation level.
pub fn indent_spaces(level: i32) -> String {
	if level <= 0 {
		return String::new();
	}

	"  ".repeat(level as usize)
}

/// Collapse repeated separators, `.` segments and trailing slashes so paths
/// read cleanly in diagnostics.
pub fn printable_path(path: &str) -> String {
	if path.is_empty() {
		return String::new();
	}

	let absolute = path.starts_with('/');
	let segments: Vec<&str> = path
		.split('/')
		.filter(|segment| !segment.is_empty() && *segment != ".")
		.collect();

	match (absolute, segments.is_empty()) {
		(true, _) => format!("/{}", segments.join("/")),
		(false, true) => ".".to_string(),
		(false, false) => segments.join("/"),
	}
}
