use std::collections::HashMap;

/// The command-history store consumed by `$history`. Index 1 is the most
/// recent item, matching how the variable is sliced interactively.
#[derive(Clone, Default)]
pub struct HistoryStore {
    items: Vec<String>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly executed command line as the most recent item.
    pub fn add<S: Into<String>>(&mut self, item: S) {
        self.items.insert(0, item.into());
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn get_all(&self) -> Vec<String> {
        self.items.clone()
    }

    /// Map 1-based indexes to their items. Out-of-range indexes are simply
    /// absent from the result.
    pub fn items_at_indexes(&self, indexes: &[usize]) -> HashMap<usize, String> {
        let mut result = HashMap::new();

        for &index in indexes {
            if index >= 1 && index <= self.items.len() {
                result.insert(index, self.items[index - 1].clone());
            }
        }

        result
    }
}

impl<S: Into<String>> FromIterator<S> for HistoryStore {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut store = Self::new();
        for item in iter {
            store.add(item);
        }
        store
    }
}
