//! The processing context: configuration snapshot, byte source, object
//! store, security handler, trailer and statistics.

use std::collections::{BTreeMap, HashSet, VecDeque};

use log::warn;

use crate::config::Config;
use crate::encryption::EncryptionState;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectId, StringFormat};
use crate::source::ByteSource;
use crate::stats::Stats;
use crate::xref::Xref;

/// One document being processed. All reads and writes are serialized
/// through this handle; independent contexts are independent documents.
#[derive(Debug)]
pub struct Context {
    pub source: ByteSource,
    /// Version from the file header, possibly overridden by the
    /// catalog's Version entry.
    pub version: String,
    /// Bytes of the second-line binary comment, kept for re-emission.
    pub binary_mark: Vec<u8>,
    pub trailer: Dictionary,
    pub xref: Xref,
    /// Materialized objects; the cache slot owns the value.
    pub objects: BTreeMap<ObjectId, Object>,
    pub(crate) pending: HashSet<ObjectId>,
    pub encryption_state: Option<EncryptionState>,
    pub config: Config,
    pub max_id: u32,
    pub stats: Stats,
}

impl Context {
    /// An empty context, the starting point for documents built in
    /// memory.
    pub fn new(config: Config) -> Context {
        Context {
            source: ByteSource::default(),
            version: "1.7".to_string(),
            binary_mark: vec![0xE2, 0xE3, 0xCF, 0xD3],
            trailer: Dictionary::new(),
            xref: Xref::new(0),
            objects: BTreeMap::new(),
            pending: HashSet::new(),
            encryption_state: None,
            config,
            max_id: 0,
            stats: Stats::default(),
        }
    }

    /// Reference to the Encrypt dictionary, when it is indirect.
    pub(crate) fn encrypt_ref(&self) -> Option<ObjectId> {
        self.trailer
            .get(b"Encrypt")
            .ok()
            .and_then(|o| o.as_reference().ok())
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailer.get(b"Encrypt").is_ok()
    }

    /// Allocate the next free object number.
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.max_id += 1;
        let id = (self.max_id, 0);
        self.objects.insert(id, object.into());
        id
    }

    pub fn set_object<T: Into<Object>>(&mut self, id: ObjectId, object: T) {
        self.objects.insert(id, object.into());
        self.max_id = self.max_id.max(id.0);
    }

    /// Follow reference chains until a non-reference value, cloning the
    /// result out of the store.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        let mut seen = HashSet::new();
        while let Object::Reference(id) = current {
            if !seen.insert(id) {
                return if self.config.strict() {
                    Err(Error::ReferenceCycle(id))
                } else {
                    Ok(Object::Null)
                };
            }
            current = self.get_object(id)?.clone();
        }
        Ok(current)
    }

    /// Resolve a dictionary entry to an integer.
    pub fn resolve_i64(&mut self, object: &Object) -> Result<i64> {
        self.resolve(object)?.as_i64()
    }

    /// The document catalog, resolved from the trailer's Root.
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self.trailer.get(b"Root")?.clone();
        let catalog = self.resolve(&root)?;
        catalog.as_dict().cloned().map_err(|_| crate::error::ValidationError::InvalidCatalog.into())
    }

    /// Make sure the trailer carries a two-element ID array; key
    /// derivation and writers rely on it.
    pub fn ensure_file_id(&mut self) {
        let have = self
            .trailer
            .get(b"ID")
            .and_then(Object::as_array)
            .map(|ids| ids.len() >= 2)
            .unwrap_or(false);
        if have {
            return;
        }
        use rand::RngCore;
        let mut rng = rand::rng();
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        rng.fill_bytes(&mut first);
        rng.fill_bytes(&mut second);
        self.trailer.set(
            "ID",
            vec![
                Object::String(first.to_vec(), StringFormat::Hexadecimal),
                Object::String(second.to_vec(), StringFormat::Hexadecimal),
            ],
        );
    }

    /// Ids of every object reachable from the trailer, in breadth-first
    /// traversal order. Materializes along the way.
    pub fn reachable_ids(&mut self) -> Result<Vec<ObjectId>> {
        let mut queue: VecDeque<ObjectId> = VecDeque::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut order = Vec::new();

        let mut roots = Vec::new();
        collect_references(&Object::Dictionary(self.trailer.clone()), &mut roots);
        for id in roots {
            if seen.insert(id) {
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            match self.get_object(id) {
                Ok(object) => {
                    order.push(id);
                    let mut refs = Vec::new();
                    collect_references(object, &mut refs);
                    for next in refs {
                        if seen.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
                Err(err) => {
                    if self.config.strict() {
                        return Err(err);
                    }
                    warn!("dropping unresolvable object {} {}: {err}", id.0, id.1);
                }
            }
        }
        Ok(order)
    }

    /// Materialize everything the cross-reference table knows about.
    pub fn materialize_all(&mut self) -> Result<()> {
        let ids: Vec<ObjectId> = self
            .xref
            .entries
            .iter()
            .filter_map(|(&num, entry)| match entry {
                crate::xref::XrefEntry::Normal { generation, .. } => Some((num, *generation)),
                crate::xref::XrefEntry::Compressed { .. } => Some((num, 0)),
                _ => None,
            })
            .collect();
        for id in ids {
            if let Err(err) = self.get_object(id) {
                if self.config.strict() {
                    return Err(err);
                }
                warn!("object {} {} could not be loaded: {err}", id.0, id.1);
            }
        }
        Ok(())
    }

    /// Force-decode every materialized stream (diagnostic mode).
    pub fn decode_all_streams(&mut self) -> Result<()> {
        self.materialize_all()?;
        let relaxed = self.config.relaxed();
        let mut decoded = 0u64;
        for (&id, object) in self.objects.iter_mut() {
            if let Object::Stream(stream) = object {
                match stream.decompress(relaxed) {
                    Ok(()) => decoded += 1,
                    Err(Error::Unsupported(filter)) => {
                        warn!("stream {} {}: {filter} payload left encoded", id.0, id.1)
                    }
                    Err(err) => {
                        if !relaxed {
                            return Err(err);
                        }
                        warn!("stream {} {} failed to decode: {err}", id.0, id.1);
                    }
                }
            }
        }
        self.stats.streams_decoded += decoded;
        Ok(())
    }

    /// Drop every object not reachable from the trailer.
    pub fn prune_unreferenced(&mut self) -> Result<usize> {
        let keep: HashSet<ObjectId> = self.reachable_ids()?.into_iter().collect();
        let before = self.objects.len();
        self.objects.retain(|id, _| keep.contains(id));
        // The table must not resurrect pruned objects from the source.
        let live: HashSet<u32> = self.objects.keys().map(|id| id.0).collect();
        self.xref.entries.retain(|number, _| live.contains(number));
        Ok(before - self.objects.len())
    }

    /// Assign contiguous numbers in traversal order from the catalog.
    /// Unreferenced objects must have been pruned first.
    pub fn renumber_objects(&mut self) -> Result<()> {
        let order = self.reachable_ids()?;
        let mapping: BTreeMap<ObjectId, ObjectId> = order
            .iter()
            .enumerate()
            .map(|(index, &old)| (old, ((index + 1) as u32, 0u16)))
            .collect();

        let mut renumbered = BTreeMap::new();
        for (old, new) in &mapping {
            if let Some(mut object) = self.objects.remove(old) {
                rewrite_references(&mut object, &mapping);
                renumbered.insert(*new, object);
            }
        }
        // Objects kept outside the traversal (nothing, after pruning)
        // would be dropped here; the caller asked for exactly that.
        self.objects = renumbered;

        let mut trailer = Object::Dictionary(std::mem::take(&mut self.trailer));
        rewrite_references(&mut trailer, &mapping);
        self.trailer = match trailer {
            Object::Dictionary(dict) => dict,
            _ => unreachable!(),
        };

        self.max_id = self.objects.keys().map(|id| id.0).max().unwrap_or(0);
        // The renumbered graph no longer corresponds to the source;
        // from here on the cache is the only truth.
        self.xref.clear();
        self.source = ByteSource::default();
        if let Some(state) = &self.encryption_state {
            state.invalidate_object_keys();
        }
        Ok(())
    }
}

/// Collect every indirect reference nested in a value.
pub(crate) fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(array) => {
            for item in array {
                collect_references(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict {
                collect_references(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in &stream.dict {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}

pub(crate) fn rewrite_references(object: &mut Object, mapping: &BTreeMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(new) = mapping.get(id) {
                *id = *new;
            } else {
                // Dangling reference; the null object is its defined
                // meaning.
                *object = Object::Null;
            }
        }
        Object::Array(array) => {
            for item in array {
                rewrite_references(item, mapping);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                rewrite_references(value, mapping);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                rewrite_references(value, mapping);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn minimal_context() -> Context {
        let mut ctx = Context::new(Config::default());
        let pages_id = (1u32, 0u16);
        let page_id = (2u32, 0u16);
        let catalog_id = (3u32, 0u16);
        ctx.set_object(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            },
        );
        ctx.set_object(
            page_id,
            dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
            },
        );
        ctx.set_object(
            catalog_id,
            dictionary! {
                "Type" => "Catalog",
                "Pages" => Object::Reference(pages_id),
            },
        );
        ctx.trailer.set("Root", Object::Reference(catalog_id));
        ctx.trailer.set("Size", 4);
        ctx
    }

    #[test]
    fn resolve_follows_reference_chains() {
        let mut ctx = minimal_context();
        let indirect = ctx.add_object(Object::Integer(7));
        let alias = ctx.add_object(Object::Reference(indirect));
        let resolved = ctx.resolve(&Object::Reference(alias)).unwrap();
        assert_eq!(resolved, Object::Integer(7));
    }

    #[test]
    fn resolve_reference_cycle_relaxed_yields_null() {
        let mut ctx = minimal_context();
        ctx.set_object((10, 0), Object::Reference((11, 0)));
        ctx.set_object((11, 0), Object::Reference((10, 0)));
        let resolved = ctx.resolve(&Object::Reference((10, 0))).unwrap();
        assert_eq!(resolved, Object::Null);

        ctx.config.validation_mode = crate::config::ValidationMode::Strict;
        assert!(ctx.resolve(&Object::Reference((10, 0))).is_err());
    }

    #[test]
    fn prune_drops_unreachable_objects() {
        let mut ctx = minimal_context();
        ctx.add_object(Object::string_literal("orphan"));
        let dropped = ctx.prune_unreferenced().unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(ctx.objects.len(), 3);
    }

    #[test]
    fn renumber_is_contiguous_and_rewrites_links() {
        let mut ctx = minimal_context();
        // Spread the ids out.
        let far = (700u32, 0u16);
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(far)],
            "Count" => 1,
        };
        ctx.set_object((1, 0), pages);
        ctx.set_object(
            far,
            dictionary! { "Type" => "Page", "Parent" => Object::Reference((1, 0)) },
        );
        ctx.objects.remove(&(2, 0));
        ctx.prune_unreferenced().unwrap();
        ctx.renumber_objects().unwrap();

        let ids: Vec<u32> = ctx.objects.keys().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ctx.max_id, 3);

        // Every reference must point at a live object.
        for object in ctx.objects.values() {
            let mut refs = Vec::new();
            collect_references(object, &mut refs);
            for id in refs {
                assert!(ctx.objects.contains_key(&id), "dangling {id:?}");
            }
        }
    }

    #[test]
    fn catalog_resolves_root() {
        let mut ctx = minimal_context();
        let catalog = ctx.catalog().unwrap();
        assert!(catalog.has_type(b"Catalog"));
    }
}
