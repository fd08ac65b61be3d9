//! Carbon-position atom labels: one lowercase letter per carbon, `a` for position 1 through `z` for position 26

use derive_more::Display;
use thiserror::Error;

/// The largest carbon position that still has a letter
pub const MAX_INDEX: u32 = 26;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct AtomLabel(String);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum LabelError {
    #[error("expected a digit at position {position}, but found {found:?}")]
    NotADigit { position: usize, found: char },
    #[error("carbon position {index} has no letter (positions run from 1 to 26)")]
    AlphabetOverflow { position: usize, index: u32 },
}

/// Maps a 1-based carbon position to its letter, or `None` outside of `1..=26`
pub fn letter(index: u32) -> Option<char> {
    (1..=MAX_INDEX)
        .contains(&index)
        .then(|| char::from(b'a' + u8::try_from(index - 1).unwrap_or_default()))
}

/// The inverse of [`letter`]
pub fn index(letter: char) -> Option<u32> {
    letter
        .is_ascii_lowercase()
        .then(|| u32::from(letter) - u32::from('a') + 1)
}

impl AtomLabel {
    /// Converts a run of decimal digits, each one a carbon position, into letters: `"123"` becomes `"abc"`
    ///
    /// # Errors
    ///
    /// Any character that isn't a digit, and the digit `0` (which names no carbon), is rejected along with its
    /// position in `digits`.
    pub fn from_digits(digits: &str) -> Result<Self, LabelError> {
        digits
            .chars()
            .enumerate()
            .map(|(position, found)| {
                let index = found
                    .to_digit(10)
                    .ok_or(LabelError::NotADigit { position, found })?;
                letter(index).ok_or(LabelError::AlphabetOverflow { position, index })
            })
            .collect::<Result<String, _>>()
            .map(Self)
    }

    /// Accepts a non-empty run of lowercase letters, as written in a compiled record
    pub fn from_letters(letters: &str) -> Option<Self> {
        (!letters.is_empty() && letters.chars().all(|c| c.is_ascii_lowercase()))
            .then(|| Self(letters.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number of carbons this label tracks
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn chars(&self) -> std::str::Chars<'_> {
        self.0.chars()
    }
}

impl FromIterator<char> for AtomLabel {
    fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
