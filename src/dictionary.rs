//! Word list used to validate answers and to draw turn fragments

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("failed to read word list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("word list contains no words long enough to draw fragments from")]
    Empty,
}

/// Read-only dictionary service shared by every room
pub trait Dictionary: Send + Sync {
    fn is_valid_word(&self, word: &str) -> bool;

    /// Case-insensitive substring check
    fn contains_fragment(&self, word: &str, fragment: &str) -> bool {
        word.to_lowercase().contains(&fragment.to_lowercase())
    }

    /// Draw the fragment the next answer has to contain
    fn random_fragment(&self) -> String;
}

const MIN_FRAGMENT_LEN: usize = 2;
const MAX_FRAGMENT_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct WordList {
    words: HashSet<String>,
    /// Words with at least MIN_FRAGMENT_LEN chars, in file order
    sources: Vec<String>,
}

impl WordList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let list = Self::from_words(contents.lines())?;
        tracing::info!("Loaded {} words from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn from_words<I, S>(words: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        let mut sources = Vec::new();

        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if word.is_empty() || !set.insert(word.clone()) {
                continue;
            }
            if word.chars().count() >= MIN_FRAGMENT_LEN {
                sources.push(word);
            }
        }

        if sources.is_empty() {
            return Err(DictionaryError::Empty);
        }

        Ok(Self {
            words: set,
            sources,
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Random 2-3 character slice of `word` (by chars, not bytes)
fn fragment_of(word: &str, rng: &mut impl Rng) -> String {
    let chars: Vec<char> = word.chars().collect();
    if chars.len() <= MIN_FRAGMENT_LEN {
        return word.to_string();
    }
    let max_len = chars.len().min(MAX_FRAGMENT_LEN);
    let len = rng.random_range(MIN_FRAGMENT_LEN..=max_len);
    let start = rng.random_range(0..=chars.len() - len);
    chars[start..start + len].iter().collect()
}

impl Dictionary for WordList {
    fn is_valid_word(&self, word: &str) -> bool {
        self.words.contains(&word.trim().to_lowercase())
    }

    fn random_fragment(&self) -> String {
        let mut rng = rand::rng();
        match self.sources.choose(&mut rng) {
            Some(word) => fragment_of(word, &mut rng),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let list = WordList::from_words(["Cathedral", "apple"]).unwrap();
        assert!(list.is_valid_word("cathedral"));
        assert!(list.is_valid_word("APPLE"));
        assert!(list.is_valid_word("  apple "));
        assert!(!list.is_valid_word("pear"));
    }

    #[test]
    fn test_contains_fragment() {
        let list = WordList::from_words(["cathedral"]).unwrap();
        assert!(list.contains_fragment("Cathedral", "THE"));
        assert!(!list.contains_fragment("cathedral", "xyz"));
    }

    #[test]
    fn test_fragments_come_from_words() {
        let list = WordList::from_words(["cathedral"]).unwrap();
        for _ in 0..50 {
            let fragment = list.random_fragment();
            let len = fragment.chars().count();
            assert!((MIN_FRAGMENT_LEN..=MAX_FRAGMENT_LEN).contains(&len));
            assert!("cathedral".contains(&fragment));
        }
    }

    #[test]
    fn test_fragment_handles_multibyte_words() {
        let list = WordList::from_words(["über"]).unwrap();
        for _ in 0..20 {
            assert!("über".contains(&list.random_fragment()));
        }
    }

    #[test]
    fn test_single_letter_words_are_not_fragment_sources() {
        let result = WordList::from_words(["a", "i", ""]);
        assert!(matches!(result, Err(DictionaryError::Empty)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "apple\nBanana\n\ncherry").unwrap();

        let list = WordList::load(file.path()).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.is_valid_word("banana"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = WordList::load("/definitely/not/here.txt");
        assert!(matches!(result, Err(DictionaryError::Io { .. })));
    }
}
