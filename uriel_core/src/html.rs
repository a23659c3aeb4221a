/// Escape text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for ch in text.chars() {
		match ch {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&apos;"),
			_ => escaped.push(ch),
		}
	}

	escaped
}

/// Neutralise CDATA delimiters so text can be embedded in a CDATA section.
pub fn escape_xml(text: &str) -> String {
	text.replace("<![CDATA[", "&lt;![CDATA[")
		.replace("]]>", "]]&gt;")
}

/// Turn plain text line breaks into `<br>` line breaks.
pub fn text_to_html(text: &str) -> String {
	text.replace('\n', "<br>\n")
}
