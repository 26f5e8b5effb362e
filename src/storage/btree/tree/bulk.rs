use std::fs;
use std::path::Path;

use tracing::debug;

use super::BPlusTree;
use crate::storage::btree::codecs::{FromInteger, KeyCodec, KeyComparator, ValCodec};
use crate::types::{IndexError, Result};

impl<K, V, C> BPlusTree<K, V, C>
where
    K: KeyCodec + FromInteger,
    V: ValCodec + FromInteger,
    C: KeyComparator<K>,
{
    /// Inserts each integer as a key, with the value built from the same
    /// integer. Returns how many were new.
    pub fn insert_keys(&mut self, keys: impl IntoIterator<Item = i64>) -> Result<usize> {
        let mut inserted = 0;
        for raw in keys {
            if self.insert(&K::from_integer(raw), &V::from_integer(raw))? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Removes each integer key. Returns how many were present.
    pub fn remove_keys(&mut self, keys: impl IntoIterator<Item = i64>) -> Result<usize> {
        let mut removed = 0;
        for raw in keys {
            if self.remove(&K::from_integer(raw))? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Inserts every whitespace-separated integer in the file at `path`.
    pub fn insert_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let keys = read_keys(path.as_ref())?;
        let inserted = self.insert_keys(keys)?;
        debug!(index = %self.name, path = %path.as_ref().display(), inserted, "btree.insert_from_file");
        Ok(inserted)
    }

    /// Removes every whitespace-separated integer in the file at `path`.
    pub fn remove_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let keys = read_keys(path.as_ref())?;
        let removed = self.remove_keys(keys)?;
        debug!(index = %self.name, path = %path.as_ref().display(), removed, "btree.remove_from_file");
        Ok(removed)
    }
}

/// Parses every token of the file as an `i64`. The whole file is read before
/// any key is applied, so a bad token leaves the tree untouched.
pub(crate) fn read_keys(path: &Path) -> Result<Vec<i64>> {
    let text = fs::read_to_string(path)?;
    text.split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|err| {
                IndexError::Parse(format!("{}: {token:?}: {err}", path.display()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::read_keys;
    use crate::types::{IndexError, Result};
    use std::io::Write;

    #[test]
    fn reads_whitespace_separated_integers() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "3 1\n-2\t10")?;
        assert_eq!(read_keys(file.path())?, vec![3, 1, -2, 10]);
        Ok(())
    }

    #[test]
    fn reports_bad_tokens() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "1 two 3")?;
        match read_keys(file.path()) {
            Err(IndexError::Parse(msg)) => assert!(msg.contains("\"two\"")),
            other => panic!("expected parse error, got {other:?}"),
        }
        Ok(())
    }
}
