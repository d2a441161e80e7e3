use std::collections::BTreeMap;

/// Cross-reference table: object number to location descriptor.
///
/// Built newest-layer-first while walking the Prev chain, so `merge`
/// only fills slots the newer layers have not claimed.
#[derive(Debug, Clone, Default)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
    /// Value of the Size entry of the trailer dictionary.
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrefEntry {
    /// In use, stored uncompressed at a byte offset.
    Normal { offset: u32, generation: u16 },
    /// Stored inside an object stream.
    Compressed { container: u32, index: u16 },
    /// Free entry of the linked free list.
    Free { next: u32, generation: u16 },
    /// Free entry that can never be reused.
    UnusableFree,
}

impl XrefEntry {
    pub fn is_normal(&self) -> bool {
        matches!(self, XrefEntry::Normal { .. })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, XrefEntry::Compressed { .. })
    }
}

impl Xref {
    pub fn new(size: u32) -> Xref {
        Xref {
            entries: BTreeMap::new(),
            size,
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    /// Merge an older layer of the update chain. Entries already present
    /// shadow the incoming ones.
    pub fn merge(&mut self, older: Xref) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        self.size = self.size.max(older.size);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    pub fn in_use_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, XrefEntry::Normal { .. } | XrefEntry::Compressed { .. }))
            .count()
    }
}
