//! Finds the reaction section of a UBF network and yields its meaningful lines

/// Lines before one starting with this marker (in any case) are ignored
pub const SECTION_MARKER: &str = "// reactions";

const COMMENT: &str = "//";

/// A trimmed input line and its 1-based line number
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RawLine<'s> {
    pub number: usize,
    pub text: &'s str,
}

/// A single-pass iterator over the non-empty, non-comment lines following the [`SECTION_MARKER`]
#[derive(Clone, Debug)]
pub struct ReactionLines<I> {
    lines: std::iter::Enumerate<I>,
    found_marker: bool,
}

impl<'s, I: Iterator<Item = &'s str>> ReactionLines<I> {
    pub fn new(lines: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            lines: lines.into_iter().enumerate(),
            found_marker: false,
        }
    }

    /// Whether the section marker has been passed yet. An exhausted iterator that never found it was given a network
    /// without any reactions
    pub const fn found_marker(&self) -> bool {
        self.found_marker
    }
}

impl<'s, I: Iterator<Item = &'s str>> Iterator for ReactionLines<I> {
    type Item = RawLine<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, line) in self.lines.by_ref() {
            if !self.found_marker {
                self.found_marker = is_marker(line);
                continue;
            }

            let text = line.trim();
            if text.is_empty() || text.starts_with(COMMENT) {
                continue;
            }

            return Some(RawLine {
                number: index + 1,
                text,
            });
        }
        None
    }
}

// NOTE: Only the first 12 characters are compared, so trailing text like `// Reactions (glycolysis)` still opens the
// section, but leading whitespace doesn't
fn is_marker(line: &str) -> bool {
    let head: String = line.chars().take(SECTION_MARKER.len()).collect();
    head.to_lowercase() == SECTION_MARKER
}
