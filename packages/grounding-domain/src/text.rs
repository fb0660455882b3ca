use std::collections::HashSet;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};

/// Upper bound on query tokens kept for overlap scoring.
pub const MAX_QUERY_TOKENS: usize = 12;

const STOP_WORDS: [&str; 24] = [
	"a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "have", "i", "in", "is", "it",
	"of", "on", "or", "the", "this", "to", "with", "you", "your",
];

/// Canonicalizes raw text into lowercase letter/digit runs separated by single spaces.
///
/// NFKC folding runs first so full-width digits, letters and symbols collapse onto their
/// ASCII forms before `+`, `%` and `&` are spelled out as words.
pub fn normalize(input: &str) -> String {
	let trimmed = input.trim();

	if trimmed.is_empty() {
		return String::new();
	}

	let folded = trimmed.nfkc().collect::<String>().to_lowercase();
	let mut out = String::with_capacity(folded.len() + 16);

	for ch in folded.chars() {
		match ch {
			'+' | '\u{FF0B}' => out.push_str(" plus "),
			'%' | '\u{FF05}' => out.push_str(" percent "),
			'&' => out.push_str(" and "),
			'\'' | '\u{2019}' | '`' => {},
			_ if ch.is_alphanumeric() => out.push(ch),
			_ => out.push(' '),
		}
	}

	collapse_whitespace(&out)
}

/// Splits normalized text into the deduplicated, order-preserving token list used for overlap
/// scoring.
pub fn tokenize(normalized: &str) -> Vec<String> {
	tokenize_with_limit(normalized, MAX_QUERY_TOKENS)
}

pub fn tokenize_with_limit(normalized: &str, max_tokens: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	if max_tokens == 0 {
		return out;
	}

	for token in normalized.split_whitespace() {
		if is_ascii_alnum(token) && !is_numeric(token) {
			if STOP_WORDS.contains(&token) {
				continue;
			}
			if token.len() < 2 {
				continue;
			}
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
		if out.len() >= max_tokens {
			break;
		}
	}

	out
}

/// Every whitespace-separated word of normalized text, without filtering or deduplication.
pub fn words(normalized: &str) -> Vec<&str> {
	normalized.split_whitespace().collect()
}

/// Normalized text with all spaces removed, for scripts that do not separate words.
pub fn compact(normalized: &str) -> String {
	normalized.chars().filter(|ch| !ch.is_whitespace()).collect()
}

pub fn contains_cjk(input: &str) -> bool {
	input.chars().any(is_cjk_char)
}

pub fn is_cjk_char(ch: char) -> bool {
	matches!(
		ch.script(),
		Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul | Script::Bopomofo
	)
}

pub fn is_numeric(token: &str) -> bool {
	!token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_ascii_alnum(token: &str) -> bool {
	!token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Whether a raw query reads as an opaque identifier rather than a product name.
///
/// UUIDs, bare hex or decimal ids of eight or more characters, and prefixed ids such as
/// `prod_123abc` or `gid://shop/Product/42` qualify. Anything containing whitespace does not.
pub fn looks_like_opaque_id(raw: &str) -> bool {
	let trimmed = raw.trim();

	if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
		return false;
	}
	if uuid::Uuid::parse_str(trimmed).is_ok() {
		return true;
	}

	let patterns = [
		r"^[0-9a-fA-F]{8,}$",
		r"(?i)^(prod|product|sku|pid|ext|item|offer)[_:\-][A-Za-z0-9_\-:]+$",
		r"(?i)^gid://\S+$",
	];

	for pattern in patterns {
		if Regex::new(pattern).map(|re| re.is_match(trimmed)).unwrap_or(false) {
			return has_digit(trimmed);
		}
	}

	false
}

fn has_digit(input: &str) -> bool {
	input.chars().any(|ch| ch.is_ascii_digit())
}

fn collapse_whitespace(input: &str) -> String {
	let mut out = String::with_capacity(input.len());

	for word in input.split_whitespace() {
		if !out.is_empty() {
			out.push(' ');
		}

		out.push_str(word);
	}

	out
}
