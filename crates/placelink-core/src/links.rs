//! Link graph registry.
//!
//! Links are stored per object in `metadata.links`. Two objects are linked
//! when they carry the same link id. [`LinkGraph`] indexes a set of
//! documents into an adjacency list so closures can be computed without
//! rescanning every object.

use crate::placeables::{ObjectKey, Placeable};
use crate::store::{
    DocumentStore, ObjectUpdate, StorageError, StorageResult, UpdateContext, WriteGateway,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Identifier shared by every object in a link.
pub type LinkId = String;

/// Direction of a link as seen from one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    #[default]
    TwoWay,
    /// Accepts deltas only. Never seeds propagation.
    Receive,
    /// Propagates outward only.
    Send,
}

impl LinkType {
    /// Whether edits to the owner cascade through this link.
    pub fn propagates(self) -> bool {
        matches!(self, LinkType::TwoWay | LinkType::Send)
    }

    /// Whether the owner accepts deltas arriving through this link.
    pub fn accepts(self) -> bool {
        matches!(self, LinkType::TwoWay | LinkType::Receive)
    }
}

/// A link entry on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Link {
    pub fn new(id: impl Into<LinkId>, link_type: LinkType) -> Self {
        Self {
            id: id.into(),
            link_type,
            label: None,
        }
    }
}

/// Generate a fresh link id.
pub fn generate_link_id() -> LinkId {
    Uuid::new_v4().simple().to_string()
}

pub fn get_links(obj: &Placeable) -> &[Link] {
    &obj.metadata.links
}

/// Add or update a link on `obj`.
///
/// Returns `false` when the object already carries the link with the same
/// type and label.
pub fn add_link(
    obj: &mut Placeable,
    link_id: &str,
    link_type: LinkType,
    label: Option<&str>,
) -> bool {
    let label = label.map(str::to_string);
    match obj.metadata.links.iter_mut().find(|l| l.id == link_id) {
        Some(existing) if existing.link_type == link_type && existing.label == label => false,
        Some(existing) => {
            existing.link_type = link_type;
            existing.label = label;
            true
        }
        None => {
            obj.metadata.links.push(Link {
                id: link_id.to_string(),
                link_type,
                label,
            });
            true
        }
    }
}

/// Remove a link from `obj`. Returns whether it was present.
pub fn remove_link(obj: &mut Placeable, link_id: &str) -> bool {
    let before = obj.metadata.links.len();
    obj.metadata.links.retain(|l| l.id != link_id);
    obj.metadata.links.len() != before
}

pub fn has_link(obj: &Placeable, link_id: &str) -> bool {
    obj.metadata.links.iter().any(|l| l.id == link_id)
}

/// Whether two objects share at least one link id.
pub fn are_linked(a: &Placeable, b: &Placeable) -> bool {
    a.metadata.links.iter().any(|l| has_link(b, &l.id))
}

/// Adjacency index over a set of documents.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    members: HashMap<LinkId, Vec<ObjectKey>>,
    links: HashMap<ObjectKey, Vec<Link>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Placeable>) -> Self {
        let mut graph = Self::new();
        for doc in documents {
            graph.insert(doc);
        }
        graph
    }

    /// Index one document's links. Documents without links are ignored.
    pub fn insert(&mut self, doc: &Placeable) {
        if doc.metadata.links.is_empty() {
            return;
        }
        let key = doc.key();
        for link in &doc.metadata.links {
            let members = self.members.entry(link.id.clone()).or_default();
            if !members.contains(&key) {
                members.push(key.clone());
            }
        }
        self.links.insert(key, doc.metadata.links.clone());
    }

    pub fn links_of(&self, key: &ObjectKey) -> &[Link] {
        self.links.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every object carrying `link_id`, in insertion order.
    pub fn members(&self, link_id: &str) -> &[ObjectKey] {
        self.members.get(link_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn link_ids(&self) -> impl Iterator<Item = &LinkId> {
        self.members.keys()
    }

    /// Type of `link_id` on the object `key`.
    pub fn link_type(&self, key: &ObjectKey, link_id: &str) -> Option<LinkType> {
        self.links_of(key)
            .iter()
            .find(|l| l.id == link_id)
            .map(|l| l.link_type)
    }

    /// Transitive closure of `seeds` over shared link ids, seeds excluded.
    ///
    /// Depth-first with an explicit stack. A link id is expanded at most
    /// once, so the walk is linear in objects plus links and terminates on
    /// cyclic topologies. With `hard_linked`, a link that is `RECEIVE` on the
    /// node being expanded is not followed from that node.
    pub fn linked_documents(&self, seeds: &[ObjectKey], hard_linked: bool) -> Vec<ObjectKey> {
        let seed_set: HashSet<&ObjectKey> = seeds.iter().collect();
        let mut processed: HashSet<&str> = HashSet::new();
        let mut seen: HashSet<&ObjectKey> = HashSet::new();
        let mut found = Vec::new();
        let mut stack: Vec<&ObjectKey> = seeds.iter().rev().collect();

        while let Some(current) = stack.pop() {
            for link in self.links_of(current) {
                if hard_linked && link.link_type == LinkType::Receive {
                    continue;
                }
                if !processed.insert(link.id.as_str()) {
                    continue;
                }
                for member in self.members(&link.id) {
                    if seed_set.contains(member) || !seen.insert(member) {
                        continue;
                    }
                    found.push(member.clone());
                    stack.push(member);
                }
            }
        }
        found
    }
}

/// Link edits persisted through the write gateway.
///
/// Writes carry `ignore_links` so editing a link never cascades.
pub struct LinkRegistry {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<WriteGateway>,
}

impl LinkRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, gateway: Arc<WriteGateway>) -> Self {
        Self { store, gateway }
    }

    fn load(&self, key: &ObjectKey) -> StorageResult<Placeable> {
        self.store
            .get_document(key.kind, &key.id)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn persist(&self, before: &Placeable, after: &Placeable) -> StorageResult<()> {
        if let Some(update) = ObjectUpdate::diff(before, after)? {
            self.gateway
                .update_documents(before.kind(), vec![update], UpdateContext::ignoring_links())
                .await?;
        }
        Ok(())
    }

    pub async fn add_link(
        &self,
        key: &ObjectKey,
        link_id: &str,
        link_type: LinkType,
        label: Option<&str>,
    ) -> StorageResult<bool> {
        let before = self.load(key)?;
        let mut after = before.clone();
        if !add_link(&mut after, link_id, link_type, label) {
            return Ok(false);
        }
        self.persist(&before, &after).await?;
        log::debug!("Added link {} ({:?}) to {}", link_id, link_type, key);
        Ok(true)
    }

    pub async fn remove_link(&self, key: &ObjectKey, link_id: &str) -> StorageResult<bool> {
        let before = self.load(key)?;
        let mut after = before.clone();
        if !remove_link(&mut after, link_id) {
            return Ok(false);
        }
        self.persist(&before, &after).await?;
        Ok(true)
    }

    /// Remove `link_id` from every object carrying it. Returns the objects
    /// that were unlinked.
    pub async fn remove_link_everywhere(&self, link_id: &str) -> StorageResult<Vec<ObjectKey>> {
        let mut unlinked = Vec::new();
        for before in self.store.documents(None) {
            if !has_link(&before, link_id) {
                continue;
            }
            let mut after = before.clone();
            remove_link(&mut after, link_id);
            self.persist(&before, &after).await?;
            unlinked.push(before.key());
        }
        Ok(unlinked)
    }

    /// Documents reachable from `seeds`, seeds excluded.
    pub fn linked_documents(&self, seeds: &[ObjectKey], hard_linked: bool) -> Vec<Placeable> {
        let documents = self.store.documents(None);
        let graph = LinkGraph::from_documents(&documents);
        graph
            .linked_documents(seeds, hard_linked)
            .into_iter()
            .filter_map(|key| self.store.get_document(key.kind, &key.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeables::{PlaceableData, Token};
    use kurbo::Point;

    fn token(id: &str) -> Placeable {
        Placeable::with_id(
            id,
            PlaceableData::Token(Token::new(Point::ZERO, 100.0, 100.0)),
        )
    }

    #[test]
    fn test_add_link_is_idempotent() {
        let mut a = token("a");
        assert!(add_link(&mut a, "L1", LinkType::TwoWay, None));
        assert!(!add_link(&mut a, "L1", LinkType::TwoWay, None));
        assert!(add_link(&mut a, "L1", LinkType::Send, Some("door")));
        assert_eq!(get_links(&a).len(), 1);
        assert_eq!(get_links(&a)[0].link_type, LinkType::Send);
    }

    #[test]
    fn test_remove_and_are_linked() {
        let mut a = token("a");
        let mut b = token("b");
        add_link(&mut a, "L1", LinkType::TwoWay, None);
        add_link(&mut b, "L1", LinkType::Receive, None);
        assert!(are_linked(&a, &b));
        assert!(remove_link(&mut b, "L1"));
        assert!(!remove_link(&mut b, "L1"));
        assert!(!are_linked(&a, &b));
    }

    #[test]
    fn test_closure_handles_cycles() {
        let mut a = token("a");
        let mut b = token("b");
        let mut c = token("c");
        add_link(&mut a, "L1", LinkType::TwoWay, None);
        add_link(&mut b, "L1", LinkType::TwoWay, None);
        add_link(&mut b, "L2", LinkType::TwoWay, None);
        add_link(&mut c, "L2", LinkType::TwoWay, None);
        add_link(&mut c, "L3", LinkType::TwoWay, None);
        add_link(&mut a, "L3", LinkType::TwoWay, None);
        let graph = LinkGraph::from_documents([&a, &b, &c]);

        let linked = graph.linked_documents(&[a.key()], false);
        assert_eq!(linked.len(), 2);
        assert!(linked.contains(&b.key()));
        assert!(linked.contains(&c.key()));
    }

    #[test]
    fn test_hard_closure_skips_receive_on_current_node() {
        let mut a = token("a");
        let mut b = token("b");
        add_link(&mut a, "L1", LinkType::Receive, None);
        add_link(&mut b, "L1", LinkType::Send, None);
        let graph = LinkGraph::from_documents([&a, &b]);

        assert!(graph.linked_documents(&[a.key()], true).is_empty());
        assert_eq!(graph.linked_documents(&[a.key()], false), vec![b.key()]);
        assert_eq!(graph.linked_documents(&[b.key()], true), vec![a.key()]);
    }

    #[test]
    fn test_link_serialization() {
        let link = Link::new("L1", LinkType::TwoWay);
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json, serde_json::json!({"id": "L1", "type": "TWO_WAY"}));
    }
}
