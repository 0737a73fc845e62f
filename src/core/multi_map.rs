use std::collections::BTreeMap;
use std::collections::btree_map;

/// Case-insensitive map from a header or parameter name to an ordered list of values.
///
/// Keys are compared ignoring ASCII case; the spelling used by the first insertion is
/// kept for display. Iteration yields keys in case-insensitive sorted order.
#[derive(Clone, Debug, Default)]
pub struct MultiValuedMap {
    entries: BTreeMap<String, MapEntry>,
}

#[derive(Clone, Debug)]
struct MapEntry {
    name: String,
    values: Vec<String>,
}

fn fold_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl MultiValuedMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, key: &str) -> &mut Vec<String> {
        &mut self
            .entries
            .entry(fold_key(key))
            .or_insert_with(|| MapEntry {
                name: key.to_owned(),
                values: Vec::new(),
            })
            .values
    }

    /// Appends a value to the key, creating it when absent.
    pub fn add(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.entry_mut(key.as_ref()).push(value.into());
        self
    }

    /// Appends every value to the key. The key exists afterwards even when `values` is empty.
    pub fn add_all<I, V>(&mut self, key: impl AsRef<str>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entry_mut(key.as_ref())
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.set_all(key, [value])
    }

    /// Replaces the value list wholesale. An empty `values` leaves the key present with no values.
    pub fn set_all<I, V>(&mut self, key: impl AsRef<str>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let slot = self.entry_mut(key.as_ref());
        slot.clear();
        slot.extend(values.into_iter().map(Into::into));
        self
    }

    /// Appends every entry of `other`, creating keys that are missing here.
    pub fn merge(&mut self, other: &MultiValuedMap) -> &mut Self {
        for (key, values) in other.iter() {
            self.add_all(key, values.iter().cloned());
        }
        self
    }

    /// Discards the current content and copies `other` in.
    pub fn replace_with(&mut self, other: &MultiValuedMap) -> &mut Self {
        self.entries = other.entries.clone();
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .get(&fold_key(key))
            .map(|entry| entry.values.as_slice())
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.get(key)?.first().map(String::as_str)
    }

    /// All values of the key joined by commas, `None` when the key is absent.
    pub fn get_flat(&self, key: &str) -> Option<String> {
        self.get(key).map(|values| values.join(","))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold_key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries
            .remove(&fold_key(key))
            .map(|entry| entry.values)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.values(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.values().map(|entry| entry.name.as_str())
    }
}

impl PartialEq for MultiValuedMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((left_key, left), (right_key, right))| {
                    left_key == right_key && left.values == right.values
                })
    }
}

impl Eq for MultiValuedMap {}

pub struct Iter<'a> {
    inner: btree_map::Values<'a, String, MapEntry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a MultiValuedMap {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for MultiValuedMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.add(key, value);
        }
        map
    }
}
