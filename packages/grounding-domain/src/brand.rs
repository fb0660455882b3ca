use std::collections::BTreeSet;

use crate::text;

/// Builtin brand families: canonical name followed by every alias that should map to it,
/// including compressed and CJK spellings.
const BUILTIN_FAMILIES: &[(&str, &[&str])] = &[
	("cerave", &["cerave", "cera ve", "适乐肤"]),
	(
		"la roche-posay",
		&["la roche posay", "laroche posay", "larocheposay", "la roche", "lrp", "理肤泉"],
	),
	("winona", &["winona", "薇诺娜"]),
	("the ordinary", &["the ordinary", "theordinary"]),
	("estee lauder", &["estee lauder", "estée lauder", "esteelauder", "雅诗兰黛"]),
	("lancome", &["lancome", "lancôme", "兰蔻"]),
	("shiseido", &["shiseido", "资生堂"]),
	("sk-ii", &["sk ii", "skii", "sk2", "sk 2"]),
	("kiehls", &["kiehls", "kiehl s", "科颜氏"]),
	("clinique", &["clinique", "倩碧"]),
	("olay", &["olay", "玉兰油"]),
	("neutrogena", &["neutrogena", "露得清"]),
	("avene", &["avene", "avène", "雅漾"]),
	("vichy", &["vichy", "薇姿"]),
	("innisfree", &["innisfree", "悦诗风吟"]),
	("anessa", &["anessa", "安热沙", "安耐晒"]),
	("bioderma", &["bioderma", "贝德玛"]),
	("proya", &["proya", "珀莱雅"]),
	("loreal", &["loreal", "l oreal", "loréal", "l oréal", "欧莱雅"]),
	("laneige", &["laneige", "兰芝"]),
	("sulwhasoo", &["sulwhasoo", "雪花秀"]),
	("la mer", &["la mer", "lamer", "海蓝之谜"]),
	("nivea", &["nivea", "妮维雅"]),
	("cetaphil", &["cetaphil", "丝塔芙"]),
	("curel", &["curel", "珂润"]),
	("fenty beauty", &["fenty beauty", "fenty"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasMatch {
	/// Space-free CJK alias; matched as a substring of the text or its compacted form.
	Compact,
	/// Latin word or phrase; matched on word boundaries.
	Padded,
}

#[derive(Debug, Clone)]
struct BrandAlias {
	canonical: String,
	alias: String,
	padded: String,
	kind: AliasMatch,
}

/// Immutable alias lookup built once at startup and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct BrandIndex {
	aliases: Vec<BrandAlias>,
}
impl BrandIndex {
	pub fn builtin() -> Self {
		let mut index = Self::default();

		for (canonical, aliases) in BUILTIN_FAMILIES {
			index.insert_family(canonical, aliases.iter().copied());
		}

		index
	}

	/// Builtin families followed by the configured ones.
	pub fn with_families(families: &[grounding_config::BrandFamily]) -> Self {
		let mut index = Self::builtin();

		for family in families {
			index.insert_family(&family.canonical, family.aliases.iter().map(String::as_str));
		}

		index
	}

	pub fn len(&self) -> usize {
		self.aliases.len()
	}

	pub fn is_empty(&self) -> bool {
		self.aliases.is_empty()
	}

	/// Canonical brands mentioned by already-normalized text.
	pub fn detect(&self, normalized: &str) -> BTreeSet<String> {
		let mut out = BTreeSet::new();

		if normalized.is_empty() {
			return out;
		}

		let padded = format!(" {normalized} ");
		let compacted = text::compact(normalized);

		for entry in &self.aliases {
			if out.contains(&entry.canonical) {
				continue;
			}

			let hit = match entry.kind {
				AliasMatch::Compact => {
					normalized.contains(entry.alias.as_str())
						|| compacted.contains(entry.alias.as_str())
				},
				AliasMatch::Padded => padded.contains(entry.padded.as_str()),
			};

			if hit {
				out.insert(entry.canonical.clone());
			}
		}

		out
	}

	fn insert_family<'a>(&mut self, canonical: &str, aliases: impl Iterator<Item = &'a str>) {
		let canonical = canonical.trim().to_lowercase();

		if canonical.is_empty() {
			return;
		}

		for raw in aliases {
			let alias = text::normalize(raw);

			if alias.is_empty() {
				continue;
			}

			let kind = if text::contains_cjk(&alias) && !alias.contains(' ') {
				AliasMatch::Compact
			} else {
				AliasMatch::Padded
			};
			let padded = format!(" {alias} ");

			self.aliases.push(BrandAlias { canonical: canonical.clone(), alias, padded, kind });
		}
	}
}
