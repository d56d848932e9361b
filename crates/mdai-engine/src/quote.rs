//! Last-quote extraction for markdown transcripts.
//!
//! A document is read as a conversation: the most recent block of `>` lines
//! at the end of the file is the live question and everything else is
//! context. A quote block that is followed by ordinary prose is stale and is
//! folded back into the context.

/// Character that opens a quoted line.
pub const QUOTE_MARKER: char = '>';

/// Separator used both to split a document into lines and to rejoin them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeparator {
    /// `\n`
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineSeparator {
    /// Separator native to the current platform.
    pub fn platform() -> Self {
        if cfg!(windows) {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// The separator text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

impl Default for LineSeparator {
    fn default() -> Self {
        Self::platform()
    }
}

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Starts with the quote marker.
    Quote,
    /// Empty or whitespace only.
    Blank,
    /// Anything else.
    Text,
}

/// Classifies lines by their first character and blank status.
///
/// Unicode white space (which includes the full-width space U+3000) always
/// counts as blank. Additional characters can be registered for documents
/// that pad lines with other invisible characters.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    marker: char,
    blank_chars: Vec<char>,
}

impl LineClassifier {
    /// Create a classifier for the standard `>` marker.
    pub fn new() -> Self {
        Self {
            marker: QUOTE_MARKER,
            blank_chars: Vec::new(),
        }
    }

    /// Treat the given characters as blank in addition to white space.
    #[must_use]
    pub fn with_blank_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.blank_chars.extend(chars);
        self
    }

    /// The quote marker this classifier recognizes.
    pub fn marker(&self) -> char {
        self.marker
    }

    fn is_blank_char(&self, c: char) -> bool {
        c.is_whitespace() || self.blank_chars.contains(&c)
    }

    /// Classify a line (without its terminator).
    pub fn classify(&self, line: &str) -> LineKind {
        if line.starts_with(self.marker) {
            LineKind::Quote
        } else if line.chars().all(|c| self.is_blank_char(c)) {
            LineKind::Blank
        } else {
            LineKind::Text
        }
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of scanning a document for its last quote block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuoteExtraction {
    /// Whether a live quote block was found at the end of the document.
    pub found: bool,
    /// Quote text with markers stripped; empty when not found.
    pub quote: String,
    /// Every line not part of the returned quote, each followed by the separator.
    pub remainder: String,
}

impl QuoteExtraction {
    /// The quote text, if one was found.
    pub fn question(&self) -> Option<&str> {
        self.found.then_some(self.quote.as_str())
    }
}

/// Finds the last live quote block of a document.
#[derive(Debug, Clone, Default)]
pub struct QuoteExtractor {
    classifier: LineClassifier,
    separator: LineSeparator,
}

impl QuoteExtractor {
    /// Create an extractor using the platform line separator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific line separator.
    #[must_use]
    pub fn with_separator(mut self, separator: LineSeparator) -> Self {
        self.separator = separator;
        self
    }

    /// Use a specific line classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: LineClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Scan `document` and split it into its last quote and the remainder.
    pub fn extract(&self, document: &str) -> QuoteExtraction {
        let sep = self.separator.as_str();
        let mut scan = Scan::new(sep);

        for line in split_lines(document, sep) {
            match (scan.state, self.classifier.classify(line)) {
                (ScanState::OutsideQuote, LineKind::Quote) => {
                    scan.demote_candidate();
                    scan.current_run.push(line);
                    scan.state = ScanState::InQuote;
                }
                (ScanState::InQuote, LineKind::Quote) => scan.current_run.push(line),
                (ScanState::InQuote, LineKind::Blank) => {
                    scan.promote_run();
                    scan.push_line(line);
                    scan.state = ScanState::OutsideQuote;
                }
                (ScanState::InQuote, LineKind::Text) => {
                    scan.flush_run();
                    scan.demote_candidate();
                    scan.push_line(line);
                    scan.state = ScanState::OutsideQuote;
                }
                (ScanState::OutsideQuote, LineKind::Text) => {
                    scan.demote_candidate();
                    scan.push_line(line);
                }
                (ScanState::OutsideQuote, LineKind::Blank) => scan.push_line(line),
            }
        }

        // A block flush against the end of the document is always live.
        if scan.state == ScanState::InQuote {
            scan.promote_run();
        }

        scan.finish(self.classifier.marker())
    }
}

/// Extract the last quote of `document` with default settings.
pub fn extract_last_quote(document: &str) -> QuoteExtraction {
    QuoteExtractor::new().extract(document)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    OutsideQuote,
    InQuote,
}

struct Scan<'a> {
    sep: &'static str,
    state: ScanState,
    current_run: Vec<&'a str>,
    candidate: Vec<&'a str>,
    remainder: String,
}

impl<'a> Scan<'a> {
    fn new(sep: &'static str) -> Self {
        Self {
            sep,
            state: ScanState::OutsideQuote,
            current_run: Vec::new(),
            candidate: Vec::new(),
            remainder: String::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.remainder.push_str(line);
        self.remainder.push_str(self.sep);
    }

    /// The run just closed becomes the candidate.
    fn promote_run(&mut self) {
        debug_assert!(self.candidate.is_empty());
        self.candidate = std::mem::take(&mut self.current_run);
    }

    /// The run just closed is stale; its lines go back to the remainder.
    fn flush_run(&mut self) {
        for line in std::mem::take(&mut self.current_run) {
            self.push_line(line);
        }
    }

    /// The candidate is no longer at the end of the document.
    fn demote_candidate(&mut self) {
        for line in std::mem::take(&mut self.candidate) {
            self.push_line(line);
        }
    }

    fn finish(self, marker: char) -> QuoteExtraction {
        if self.candidate.is_empty() {
            return QuoteExtraction {
                found: false,
                quote: String::new(),
                remainder: self.remainder,
            };
        }

        let quote = self
            .candidate
            .iter()
            .map(|line| strip_marker(line, marker))
            .collect::<Vec<_>>()
            .join(self.sep);

        QuoteExtraction {
            found: true,
            quote,
            remainder: self.remainder,
        }
    }
}

/// Split on `sep`; a trailing separator ends the last line rather than
/// opening a new one, and the empty document is a single empty line.
fn split_lines<'a>(document: &'a str, sep: &str) -> Vec<&'a str> {
    let mut lines: Vec<&str> = document.split_terminator(sep).collect();
    if lines.is_empty() {
        lines.push("");
    }
    lines
}

/// Drop one marker and at most one following space.
fn strip_marker(line: &str, marker: char) -> &str {
    let rest = line.strip_prefix(marker).unwrap_or(line);
    rest.strip_prefix(' ').unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_lf(document: &str) -> QuoteExtraction {
        QuoteExtractor::new()
            .with_separator(LineSeparator::Lf)
            .extract(document)
    }

    #[test]
    fn test_classify_lines() {
        let classifier = LineClassifier::new();
        assert_eq!(classifier.classify("> question"), LineKind::Quote);
        assert_eq!(classifier.classify(">"), LineKind::Quote);
        assert_eq!(classifier.classify(""), LineKind::Blank);
        assert_eq!(classifier.classify(" \t "), LineKind::Blank);
        assert_eq!(classifier.classify("\u{3000}\u{3000}"), LineKind::Blank);
        assert_eq!(classifier.classify(" > indented"), LineKind::Text);
        assert_eq!(classifier.classify("prose"), LineKind::Text);
    }

    #[test]
    fn test_classify_extra_blank_chars() {
        let plain = LineClassifier::new();
        assert_eq!(plain.classify("\u{200B}"), LineKind::Text);

        let extended = LineClassifier::new().with_blank_chars(['\u{200B}', '\u{FEFF}']);
        assert_eq!(extended.classify("\u{200B} \u{FEFF}"), LineKind::Blank);
        assert_eq!(extended.classify("\u{200B}x"), LineKind::Text);
    }

    #[test]
    fn test_quote_after_plain_line() {
        let result = extract_lf("plain\n> hello\n> world");
        assert!(result.found);
        assert_eq!(result.quote, "hello\nworld");
        assert_eq!(result.remainder, "plain\n");
    }

    #[test]
    fn test_stale_quote_before_prose() {
        let result = extract_lf("> first\ntext\n\n> second");
        assert!(result.found);
        assert_eq!(result.quote, "second");
        assert_eq!(result.remainder, "> first\ntext\n\n");
    }

    #[test]
    fn test_quote_followed_by_blank_lines() {
        let result = extract_lf("plain\n\n> block\n\n");
        assert!(result.found);
        assert_eq!(result.quote, "block");
        assert_eq!(result.remainder, "plain\n\n\n");
    }

    #[test]
    fn test_no_quote() {
        let result = extract_lf("plain text only");
        assert!(!result.found);
        assert_eq!(result.quote, "");
        assert_eq!(result.remainder, "plain text only\n");
        assert_eq!(result.question(), None);
    }

    #[test]
    fn test_empty_document() {
        let result = extract_lf("");
        assert!(!result.found);
        assert_eq!(result.quote, "");
        assert_eq!(result.remainder, "\n");
    }

    #[test]
    fn test_quote_only_document() {
        let result = extract_lf("> only\n> quote");
        assert!(result.found);
        assert_eq!(result.quote, "only\nquote");
        assert_eq!(result.remainder, "");
        assert_eq!(result.question(), Some("only\nquote"));
    }

    #[test]
    fn test_blank_terminated_candidate_demoted_by_next_quote() {
        let doc = "> first\n> cont\ntext\n\n> second\n> cont\n\n> third";
        let result = extract_lf(doc);
        assert!(result.found);
        assert_eq!(result.quote, "third");
        assert_eq!(
            result.remainder,
            "> first\n> cont\ntext\n\n\n> second\n> cont\n"
        );
    }

    #[test]
    fn test_quote_followed_by_whitespace_line() {
        let result = extract_lf("text\n\n> block\n> more\n    ");
        assert!(result.found);
        assert_eq!(result.quote, "block\nmore");
        assert_eq!(result.remainder, "text\n\n    \n");
    }

    #[test]
    fn test_quote_followed_by_full_width_spaces() {
        let result = extract_lf("通常のテキスト\n\n> 引用ブロック\n\u{3000}\u{3000}");
        assert!(result.found);
        assert_eq!(result.quote, "引用ブロック");
        assert_eq!(result.remainder, "通常のテキスト\n\n\u{3000}\u{3000}\n");
    }

    #[test]
    fn test_repeated_invalidation() {
        let doc = "> one\ntext one\n\n> two\ntext two\n\n> three\ntext three\n\n> last";
        let result = extract_lf(doc);
        assert!(result.found);
        assert_eq!(result.quote, "last");
        assert_eq!(
            result.remainder,
            "> one\ntext one\n\n> two\ntext two\n\n> three\ntext three\n\n"
        );
    }

    #[test]
    fn test_prose_after_blank_invalidates_candidate() {
        let doc = "text\n\n> block\n> more\n\n   \n   trailing prose\n   \n";
        let result = extract_lf(doc);
        assert!(!result.found);
        assert_eq!(result.quote, "");
        assert_eq!(
            result.remainder,
            "text\n\n\n   \n> block\n> more\n   trailing prose\n   \n"
        );
    }

    #[test]
    fn test_only_one_space_stripped() {
        let result = extract_lf("text\n\n> first\n>    indented\n>tight");
        assert!(result.found);
        assert_eq!(result.quote, "first\n   indented\ntight");
        assert_eq!(result.remainder, "text\n\n");
    }

    #[test]
    fn test_trailing_separator_after_quote() {
        let result = extract_lf("context\n> question\n");
        assert!(result.found);
        assert_eq!(result.quote, "question");
        assert_eq!(result.remainder, "context\n");
    }

    #[test]
    fn test_crlf_separator() {
        let extractor = QuoteExtractor::new().with_separator(LineSeparator::Crlf);
        let result = extractor.extract("plain\r\n> hello\r\n> world\r\n\r\n");
        assert!(result.found);
        assert_eq!(result.quote, "hello\r\nworld");
        assert_eq!(result.remainder, "plain\r\n\r\n");
    }

    #[test]
    fn test_extra_blank_chars_keep_quote_live() {
        let doc = "text\n> question\n\u{200B}";
        assert!(!extract_lf(doc).found);

        let extractor = QuoteExtractor::new()
            .with_separator(LineSeparator::Lf)
            .with_classifier(LineClassifier::new().with_blank_chars(['\u{200B}']));
        let result = extractor.extract(doc);
        assert!(result.found);
        assert_eq!(result.quote, "question");
        assert_eq!(result.remainder, "text\n\u{200B}\n");
    }

    #[test]
    fn test_partition_keeps_every_line() {
        let docs = [
            "plain\n> hello\n> world",
            "> first\ntext\n\n> second",
            "> a\n\n> b\n\n> c\n\n",
            "intro\n> a\n\nprose\n> b\n> c\n\n\u{3000}",
            "> a\n\nprose\n\n",
            "> a\n> b\ntext\n> c\n",
        ];

        for doc in docs {
            let result = extract_lf(doc);

            let mut expected: Vec<String> = doc.split_terminator('\n').map(String::from).collect();
            let mut actual: Vec<String> = result
                .remainder
                .split_terminator('\n')
                .map(String::from)
                .collect();
            if result.found {
                actual.extend(result.quote.split('\n').map(|line| format!("> {line}")));
            }

            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "lines lost or duplicated for {doc:?}");
        }
    }

    #[test]
    fn test_default_separator_is_platform() {
        assert_eq!(LineSeparator::default(), LineSeparator::platform());
        let sep = LineSeparator::platform().as_str();
        let doc = format!("context{sep}> question");
        let result = extract_last_quote(&doc);
        assert!(result.found);
        assert_eq!(result.quote, "question");
        assert_eq!(result.remainder, format!("context{sep}"));
    }
}
