use std::collections::VecDeque;

use crate::UrielError;
use crate::UrielResult;
use crate::log::indent_spaces;
use crate::node::NODES_DIR;
use crate::node::TEMPLATES_DIR;

/// An active template expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
	pub template: String,
	pub node_path: String,
	/// Pushed directly from a node body. Loop detection does not look past
	/// the most recent boundary.
	pub node_body: bool,
}

/// Tracks the templates being expanded so include loops are caught before
/// they recurse.
#[derive(Debug, Clone, Default)]
pub struct TemplateStack {
	frames: VecDeque<StackFrame>,
}

impl TemplateStack {
	pub fn new() -> Self {
		Self::default()
	}

	/// Push a template, failing with [`UrielError::IncludeLoop`] when the
	/// same template is already being expanded in the current scope.
	pub fn push(&mut self, template: &str, node_path: &str, node_body: bool) -> UrielResult<()> {
		let scope_start = self
			.frames
			.iter()
			.rposition(|frame| frame.node_body)
			.unwrap_or(0);

		let repeated = self
			.frames
			.iter()
			.enumerate()
			.skip(scope_start)
			.find(|(_, frame)| frame.template == template)
			.map(|(index, _)| index);

		if let Some(loop_start) = repeated {
			return Err(UrielError::IncludeLoop {
				node: node_path.to_string(),
				lines: self.loop_report(loop_start, template, node_path, node_body),
			});
		}

		self.frames.push_back(StackFrame {
			template: template.to_string(),
			node_path: node_path.to_string(),
			node_body,
		});

		Ok(())
	}

	fn loop_report(
		&self,
		loop_start: usize,
		template: &str,
		node_path: &str,
		node_body: bool,
	) -> Vec<String> {
		let mut lines = vec![
			"include loop error:".to_string(),
			format!("{}{NODES_DIR}/{node_path}", indent_spaces(1)),
		];

		for (index, frame) in self.frames.iter().enumerate() {
			let name = format!("{TEMPLATES_DIR}/{}", frame.template);
			match index.cmp(&loop_start) {
				std::cmp::Ordering::Less => lines.push(format!("{}{name}", indent_spaces(2))),
				std::cmp::Ordering::Equal => lines.push(format!(">>> {name} <<< LOOP STARTS HERE")),
				std::cmp::Ordering::Greater => lines.push(format!("  > {name}")),
			}
		}

		let repeated = format!("{TEMPLATES_DIR}/{template}");
		if node_body {
			lines.push(format!("  > {}{{{{node:body}}}}", indent_spaces(1)));
			lines.push(format!("  > {}{NODES_DIR}/{node_path}", indent_spaces(2)));
			lines.push(format!(
				"  > {}{{{{include:{template}}}}}",
				indent_spaces(3)
			));
			lines.push(format!(
				">>> {}{repeated} <<< WOULD REPEAT FOREVER",
				indent_spaces(4)
			));
		} else {
			lines.push(format!(">>> {repeated} <<< WOULD REPEAT FOREVER"));
		}

		lines
	}

	/// Remove the newest frame, returning its template name.
	pub fn pop(&mut self) -> UrielResult<String> {
		self.frames
			.pop_back()
			.map(|frame| frame.template)
			.ok_or(UrielError::EmptyTemplateStack)
	}

	/// Remove the oldest frame, returning its template name.
	pub fn shift(&mut self) -> UrielResult<String> {
		self.frames
			.pop_front()
			.map(|frame| frame.template)
			.ok_or(UrielError::EmptyTemplateStack)
	}

	pub fn has_more_elements(&self) -> bool {
		!self.frames.is_empty()
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	/// Frames from oldest to newest.
	pub fn frames(&self) -> impl Iterator<Item = &StackFrame> {
		self.frames.iter()
	}
}
