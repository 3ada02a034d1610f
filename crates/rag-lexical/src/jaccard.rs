use std::collections::HashSet;

use rag_core::traits::Scorer;

/// Lowercased whitespace-separated words, as a set. Punctuation stays attached.
pub fn tokenize(text: &str) -> HashSet<String> {
	text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// `|A ∩ B| / |A ∪ B|` over [`tokenize`] sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct JaccardScorer;

impl JaccardScorer {
	pub fn score_sets(query: &HashSet<String>, document: &HashSet<String>) -> f32 {
		let union = query.union(document).count();
		if union == 0 { return 0.0; }
		let intersection = query.intersection(document).count();
		intersection as f32 / union as f32
	}
}

impl Scorer for JaccardScorer {
	fn score(&self, query: &str, document: &str) -> f32 { Self::score_sets(&tokenize(query), &tokenize(document)) }
}
