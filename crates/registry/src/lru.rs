//! Bounded least-recently-used map of parsed schemas.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use formweave_core::Schema;

#[derive(Debug)]
pub(crate) struct Lru {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (Arc<Schema>, u64)>,
    /// Last-use tick to key; the first entry is the eviction candidate.
    order: BTreeMap<u64, String>,
}

impl Lru {
    pub(crate) fn new(capacity: usize) -> Self {
        Lru {
            capacity,
            tick: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<Arc<Schema>> {
        let tick = self.touch();
        let (schema, used) = self.entries.get_mut(key)?;
        self.order.remove(used);
        *used = tick;
        self.order.insert(tick, key.to_string());
        Some(Arc::clone(schema))
    }

    pub(crate) fn insert(&mut self, key: String, schema: Arc<Schema>) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.touch();
        if let Some((_, used)) = self.entries.insert(key.clone(), (schema, tick)) {
            self.order.remove(&used);
        }
        self.order.insert(tick, key);
        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub(crate) fn remove(&mut self, key: &str) {
        if let Some((_, used)) = self.entries.remove(key) {
            self.order.remove(&used);
        }
    }

    pub(crate) fn remove_prefix(&mut self, prefix: &str) {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in doomed {
            self.remove(&key);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{FieldBuilder, SchemaBuilder};

    fn schema(id: &str) -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::form(id)
                .field(FieldBuilder::text("a").label("A"))
                .must_build(),
        )
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut lru = Lru::new(2);
        lru.insert("a".into(), schema("a"));
        lru.insert("b".into(), schema("b"));
        assert!(lru.get("a").is_some());
        lru.insert("c".into(), schema("c"));

        assert_eq!(lru.len(), 2);
        assert!(lru.get("b").is_none());
        assert!(lru.get("a").is_some());
        assert!(lru.get("c").is_some());
    }

    #[test]
    fn reinsert_refreshes_entry() {
        let mut lru = Lru::new(2);
        lru.insert("a".into(), schema("a"));
        lru.insert("b".into(), schema("b"));
        lru.insert("a".into(), schema("a2"));
        lru.insert("c".into(), schema("c"));
        assert_eq!(lru.get("a").map(|s| s.id.clone()), Some("a2".to_string()));
        assert!(lru.get("b").is_none());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut lru = Lru::new(0);
        lru.insert("a".into(), schema("a"));
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn prefix_removal() {
        let mut lru = Lru::new(8);
        lru.insert("schema:u".into(), schema("u"));
        lru.insert("schema:u:v:1".into(), schema("u"));
        lru.insert("schema:w".into(), schema("w"));
        lru.remove_prefix("schema:u:v:");
        assert_eq!(lru.len(), 2);
        lru.clear();
        assert_eq!(lru.len(), 0);
    }
}
