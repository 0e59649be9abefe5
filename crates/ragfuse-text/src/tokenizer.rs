use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Splits text on non-alphanumeric characters and lowercases every term.
///
/// Documents and queries must go through the same tokenizer for term
/// statistics to line up.
#[derive(Clone)]
pub struct Tokenizer {
	analyzer: TextAnalyzer,
}

impl Tokenizer {
	pub fn new() -> Self {
		let analyzer = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
		Self { analyzer }
	}

	/// Same as [`Tokenizer::new`] but drops common English function words.
	pub fn with_stop_words() -> Self {
		let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
			.filter(LowerCaser)
			.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
			.build();
		Self { analyzer }
	}

	pub fn tokenize(&self, text: &str) -> Vec<String> {
		// token_stream needs exclusive access; analyzers are cheap to clone
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(text);
		let mut terms = Vec::new();
		while stream.advance() {
			terms.push(stream.token().text.clone());
		}
		terms
	}
}

impl Default for Tokenizer {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Tokenizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tokenizer").finish_non_exhaustive()
	}
}
