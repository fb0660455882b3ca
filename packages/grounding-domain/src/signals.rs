use std::collections::BTreeSet;

use crate::text::{is_ascii_alnum, is_numeric};

const VOLUME_UNITS: [&str; 6] = ["ml", "l", "g", "kg", "mg", "oz"];
const PERCENT_WORD: &str = "percent";
const SPF_WORD: &str = "spf";
const MODEL_MIN_CHARS: usize = 4;
const MODEL_MAX_CHARS: usize = 16;
const MODEL_PREFIX_MAX_CHARS: usize = 3;

/// Numeric and code-like signals pulled out of normalized words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
	/// Amount plus unit, e.g. `50ml`.
	pub volume: BTreeSet<String>,
	/// SPF strength, e.g. `50`.
	pub spf: BTreeSet<String>,
	/// Number that preceded a `percent` word.
	pub percent: BTreeSet<String>,
	/// Alphanumeric model codes.
	pub model: BTreeSet<String>,
}
impl Signals {
	pub fn is_empty(&self) -> bool {
		self.volume.is_empty()
			&& self.spf.is_empty()
			&& self.percent.is_empty()
			&& self.model.is_empty()
	}
}

pub fn extract_signals<S>(words: &[S]) -> Signals
where
	S: AsRef<str>,
{
	let mut out = Signals::default();

	for (index, word) in words.iter().enumerate() {
		let word = word.as_ref();
		let next = words.get(index + 1).map(|value| value.as_ref());

		if let Some(volume) = parse_volume(word) {
			out.volume.insert(volume);

			continue;
		}
		if let Some(spf) = parse_fused_spf(word) {
			out.spf.insert(spf);

			continue;
		}
		if is_numeric(word) {
			match next {
				Some(unit) if VOLUME_UNITS.contains(&unit) => {
					out.volume.insert(format!("{}{unit}", canonical_number(word)));
				},
				Some(PERCENT_WORD) => {
					out.percent.insert(canonical_number(word).to_string());
				},
				_ => {},
			}

			continue;
		}
		if word == SPF_WORD {
			if let Some(strength) = next.filter(|value| is_numeric(value)) {
				out.spf.insert(canonical_number(strength).to_string());
			}

			continue;
		}
		if is_model_code(word) {
			out.model.insert(word.to_string());
		}
		if let Some(next) = next
			&& is_model_prefix(word)
			&& next.starts_with(|ch: char| ch.is_ascii_digit())
			&& is_ascii_alnum(next)
		{
			let merged = format!("{word}{next}");

			if is_model_code(&merged) {
				out.model.insert(merged);
			}
		}
	}

	out
}

fn parse_volume(word: &str) -> Option<String> {
	let split = word.find(|ch: char| !ch.is_ascii_digit())?;

	if split == 0 {
		return None;
	}

	let (number, unit) = word.split_at(split);

	if !VOLUME_UNITS.contains(&unit) {
		return None;
	}

	Some(format!("{}{unit}", canonical_number(number)))
}

fn parse_fused_spf(word: &str) -> Option<String> {
	let strength = word.strip_prefix(SPF_WORD)?;

	if !is_numeric(strength) {
		return None;
	}

	Some(canonical_number(strength).to_string())
}

/// Alphanumeric code of model length carrying both letters and digits, excluding volume and SPF
/// forms which have their own families.
fn is_model_code(word: &str) -> bool {
	let len = word.len();

	if !(MODEL_MIN_CHARS..=MODEL_MAX_CHARS).contains(&len) || !is_ascii_alnum(word) {
		return false;
	}
	if !word.bytes().any(|b| b.is_ascii_alphabetic()) || !word.bytes().any(|b| b.is_ascii_digit())
	{
		return false;
	}

	parse_volume(word).is_none() && parse_fused_spf(word).is_none()
}

fn is_model_prefix(word: &str) -> bool {
	!word.is_empty()
		&& word.len() <= MODEL_PREFIX_MAX_CHARS
		&& word.bytes().all(|b| b.is_ascii_alphabetic())
		&& word != SPF_WORD
		&& !VOLUME_UNITS.contains(&word)
}

fn canonical_number(digits: &str) -> &str {
	let trimmed = digits.trim_start_matches('0');

	if trimmed.is_empty() { "0" } else { trimmed }
}
