use logos::Logos;

use crate::token::Token;

/// Raw tokens produced by logos. Everything that is not a complete
/// placeholder ends up in a literal run.
#[derive(Logos, Debug, PartialEq)]
enum RawToken {
	#[regex(r"\{\{([^}\n]|\}[^}\n])*\}\}")]
	Placeholder,
	#[token("{")]
	BraceOpen,
	#[regex(r"[^{]+")]
	Text,
}

/// Split `source` into literal runs and placeholders.
///
/// Concatenating the `original` text of every returned token reproduces
/// `source` exactly. Adjacent literal text is always coalesced into a single
/// token.
pub fn tokenize(source: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut literal_start: Option<usize> = None;

	for (raw, span) in RawToken::lexer(source).spanned() {
		if raw == Ok(RawToken::Placeholder) {
			if let Some(start) = literal_start.take() {
				tokens.push(Token::new(&source[start..span.start]));
			}
			tokens.push(Token::new(&source[span]));
		} else if literal_start.is_none() {
			literal_start = Some(span.start);
		}
	}

	if let Some(start) = literal_start {
		tokens.push(Token::new(&source[start..]));
	}

	tokens
}
