//! Relation Graph Resolver
//!
//! Flattens the authority's nested artist relations (stored in the file as
//! JSON) into an ordered, id-deduplicated list of registered artists.
//!
//! # Algorithm
//! 1. Depth-first walk in document order. An id is registered the first time
//!    it is seen, which fixes its position; its children are walked before
//!    the next sibling. Repeated ids are not inserted again, but their
//!    children are still walked so every descendant is reachable.
//! 2. The voice-actor reordering pass runs over the flattened sequence and
//!    over every record's own child sequence.
//!
//! Records without an id or a name are skipped together with their subtree
//! and reported as [`MalformedGraphError`]; the rest of the graph resolves.
//!
//! The walk builds an arena: one [`RelationNode`] per record occurrence,
//! children referenced by index, artists shared through the registry.

use crate::models::{Alias, Artist, ArtistDetails, ArtistRef, ArtistSource, ArtistType, IdentityKey};
use crate::registry::IdentityRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Joinphrase opening a voice-actor annotation, e.g. `"(CV: "`
static CV_JOINPHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\(cv[:.\s]").unwrap_or_else(|e| panic!("invalid CV joinphrase pattern: {e}"))
});

/// Graph JSON could not be used at all
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Relation graph is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A record is missing a required field; its subtree was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed relation record at {path}: missing '{field}'")]
pub struct MalformedGraphError {
    /// Position of the record, e.g. `[0].children[2]`
    pub path: String,
    pub field: &'static str,
}

/// One relation record as stored by the metadata authority
///
/// Every field is optional at the parse level so a single bad record never
/// fails the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    pub disambiguation: Option<String>,
    #[serde(rename = "sortName", alias = "sort_name", alias = "sort-name")]
    pub sort_name: Option<String>,
    pub joinphrase: Option<String>,
    pub aliases: Vec<Alias>,
    #[serde(alias = "relations")]
    pub children: Vec<RelationRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GraphDocument {
    Many(Vec<RelationRecord>),
    One(RelationRecord),
}

/// A position in a credit sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditSlot {
    pub key: IdentityKey,
    /// Connective text towards the next sibling
    pub joinphrase: String,
    /// Moved by the voice-actor pass; never swapped again
    pub reordered: bool,
    /// Arena index of the record occurrence
    pub node: usize,
}

/// One record occurrence in the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationNode {
    pub key: IdentityKey,
    pub children: Vec<CreditSlot>,
}

/// Output of [`GraphResolver::resolve`]
#[derive(Debug, Default)]
pub struct ResolvedGraph {
    /// Distinct artists in crediting order
    pub artists: Vec<ArtistRef>,
    /// Slots matching `artists`, with joinphrases
    pub credits: Vec<CreditSlot>,
    /// Top-level records, reordered
    pub roots: Vec<CreditSlot>,
    pub nodes: Vec<RelationNode>,
    /// Subtrees skipped because of missing fields
    pub errors: Vec<MalformedGraphError>,
}

#[derive(Default)]
struct WalkState {
    seen: HashSet<IdentityKey>,
    resolved: HashMap<IdentityKey, ArtistRef>,
    flat: Vec<CreditSlot>,
    nodes: Vec<RelationNode>,
    errors: Vec<MalformedGraphError>,
}

/// Resolves relation graphs into registry entries
pub struct GraphResolver<'a> {
    registry: &'a IdentityRegistry,
}

impl<'a> GraphResolver<'a> {
    pub fn new(registry: &'a IdentityRegistry) -> Self {
        Self { registry }
    }

    /// Parse graph JSON (a list of records or a single record) and resolve it
    pub fn resolve_json(&self, json: &str) -> Result<ResolvedGraph, GraphError> {
        let records = match serde_json::from_str::<GraphDocument>(json)? {
            GraphDocument::Many(records) => records,
            GraphDocument::One(record) => vec![record],
        };
        Ok(self.resolve(&records))
    }

    pub fn resolve(&self, records: &[RelationRecord]) -> ResolvedGraph {
        let mut state = WalkState::default();

        let mut roots: Vec<CreditSlot> = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| self.walk(record, format!("[{}]", i), &mut state))
            .collect();

        let mut swaps = reorder_voice_actor_pairs(&mut state.flat);
        swaps += reorder_voice_actor_pairs(&mut roots);
        for node in &mut state.nodes {
            swaps += reorder_voice_actor_pairs(&mut node.children);
        }

        let artists: Vec<ArtistRef> = state
            .flat
            .iter()
            .filter_map(|slot| state.resolved.get(&slot.key).map(Arc::clone))
            .collect();

        debug!(
            artists = artists.len(),
            nodes = state.nodes.len(),
            swaps = swaps,
            malformed = state.errors.len(),
            "Resolved relation graph"
        );

        ResolvedGraph {
            artists,
            credits: state.flat,
            roots,
            nodes: state.nodes,
            errors: state.errors,
        }
    }

    fn walk(&self, record: &RelationRecord, path: String, state: &mut WalkState) -> Option<CreditSlot> {
        let id = non_empty(record.id.as_deref());
        let name = non_empty(record.name.as_deref());
        let (id, name) = match (id, name) {
            (Some(id), Some(name)) => (id, name),
            (None, _) => return skip(path, "id", state),
            (_, None) => return skip(path, "name", state),
        };

        let key = IdentityKey::external(id);
        let joinphrase = record.joinphrase.clone().unwrap_or_default();
        let node = state.nodes.len();
        state.nodes.push(RelationNode {
            key: key.clone(),
            children: Vec::new(),
        });

        let slot = CreditSlot {
            key: key.clone(),
            joinphrase,
            reordered: false,
            node,
        };

        if state.seen.insert(key.clone()) {
            let artist = self.registry.register(artist_from_record(key.clone(), name, record));
            state.resolved.insert(key, artist);
            state.flat.push(slot.clone());
        }

        let children: Vec<CreditSlot> = record
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, child)| self.walk(child, format!("{}.children[{}]", path, i), state))
            .collect();
        state.nodes[node].children = children;

        Some(slot)
    }
}

fn skip(path: String, field: &'static str, state: &mut WalkState) -> Option<CreditSlot> {
    warn!(path = %path, field = field, "Skipping malformed relation record");
    state.errors.push(MalformedGraphError { path, field });
    None
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Only people and groups are credited by default
fn artist_from_record(key: IdentityKey, name: &str, record: &RelationRecord) -> Artist {
    let label = record.artist_type.as_deref();
    let include = matches!(
        label.map(|l| l.trim().to_ascii_lowercase()).as_deref(),
        Some("person") | Some("group")
    );
    let sort_name = non_empty(record.sort_name.as_deref()).map(str::to_string);
    let display = sort_name.clone().unwrap_or_else(|| name.to_string());

    let mut details = ArtistDetails::new(name, ArtistType::from_label(label), include, display);
    details.disambiguation = record.disambiguation.clone();
    details.sort_name = sort_name;
    details.aliases = record.aliases.clone();
    details.custom_original_name = Some(name.to_string());

    Artist::new(key, ArtistSource::Graph, details)
}

/// Put the voice actor before the character in `"Character (CV. Person)"` credits
///
/// Scans adjacent pairs left to right. A pair is swapped when the first
/// joinphrase opens a CV annotation and the second starts with `)`. Swapped
/// slots are marked and skipped, both for the rest of the scan and for later
/// passes, so running the pass on its own output changes nothing.
///
/// Returns the number of swaps.
pub fn reorder_voice_actor_pairs(slots: &mut [CreditSlot]) -> usize {
    let mut swaps = 0;
    let mut i = 0;

    while i + 1 < slots.len() {
        let (first, second) = (&slots[i], &slots[i + 1]);
        let eligible = !first.reordered
            && !second.reordered
            && CV_JOINPHRASE.is_match(first.joinphrase.trim_start())
            && second.joinphrase.trim_start().starts_with(')');

        if eligible {
            slots.swap(i, i + 1);
            slots[i].reordered = true;
            slots[i + 1].reordered = true;
            swaps += 1;
            i += 2;
        } else {
            i += 1;
        }
    }

    swaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(value: serde_json::Value) -> (ResolvedGraph, IdentityRegistry) {
        let registry = IdentityRegistry::new();
        let resolved = GraphResolver::new(&registry)
            .resolve_json(&value.to_string())
            .unwrap();
        (resolved, registry)
    }

    fn ids(resolved: &ResolvedGraph) -> Vec<String> {
        resolved.artists.iter().map(|a| a.key().to_string()).collect()
    }

    fn slot(key: &str, joinphrase: &str) -> CreditSlot {
        CreditSlot {
            key: IdentityKey::external(key),
            joinphrase: joinphrase.to_string(),
            reordered: false,
            node: 0,
        }
    }

    fn keys(slots: &[CreditSlot]) -> Vec<&str> {
        slots.iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_depth_first_document_order() {
        let (resolved, _) = resolve(json!([
            {"id": "a", "name": "A", "type": "Person", "relations": [
                {"id": "a1", "name": "A1", "type": "Person"},
                {"id": "a2", "name": "A2", "type": "Person"}
            ]},
            {"id": "b", "name": "B", "type": "Group"}
        ]));

        assert_eq!(ids(&resolved), vec!["a", "a1", "a2", "b"]);
        assert!(resolved.errors.is_empty());
    }

    #[test]
    fn test_repeated_ids_registered_once_but_children_visited() {
        let (resolved, registry) = resolve(json!([
            {"id": "g", "name": "Group", "type": "Group", "children": [
                {"id": "p", "name": "Person", "type": "Person"}
            ]},
            {"id": "g", "name": "Group", "type": "Group", "children": [
                {"id": "q", "name": "Other member", "type": "Person"}
            ]},
            {"id": "p", "name": "Person", "type": "Person"}
        ]));

        assert_eq!(ids(&resolved), vec!["g", "p", "q"]);
        assert_eq!(registry.len(), 3);
        // one node per occurrence
        assert_eq!(resolved.nodes.len(), 5);
    }

    #[test]
    fn test_type_defaults() {
        let (resolved, _) = resolve(json!([
            {"id": "p", "name": "P", "type": "Person"},
            {"id": "g", "name": "G", "type": "group"},
            {"id": "c", "name": "C", "type": "Character"},
            {"id": "o", "name": "O", "type": "Orchestra"},
            {"id": "n", "name": "N"}
        ]));

        let include: Vec<bool> = resolved.artists.iter().map(|a| a.include()).collect();
        assert_eq!(include, vec![true, true, false, false, false]);
        assert_eq!(resolved.artists[2].kind(), ArtistType::Character);
    }

    #[test]
    fn test_custom_name_defaults_to_sort_name() {
        let (resolved, _) = resolve(json!([
            {"id": "p", "name": "Firstname Lastname", "sort_name": "Lastname, Firstname", "type": "Person"}
        ]));

        let details = resolved.artists[0].snapshot();
        assert_eq!(details.custom_name, "Lastname, Firstname");
        assert_eq!(details.custom_original_name.as_deref(), Some("Firstname Lastname"));
    }

    #[test]
    fn test_malformed_subtree_is_skipped() {
        let (resolved, _) = resolve(json!([
            {"id": "a", "name": "A", "type": "Person"},
            {"name": "No id", "children": [{"id": "hidden", "name": "Hidden"}]},
            {"id": "b", "type": "Person"},
            {"id": "c", "name": "C", "type": "Person"}
        ]));

        assert_eq!(ids(&resolved), vec!["a", "c"]);
        assert_eq!(
            resolved.errors,
            vec![
                MalformedGraphError { path: "[1]".to_string(), field: "id" },
                MalformedGraphError { path: "[2]".to_string(), field: "name" },
            ]
        );
    }

    #[test]
    fn test_invalid_json_is_error() {
        let registry = IdentityRegistry::new();
        let result = GraphResolver::new(&registry).resolve_json("{not json");
        assert!(matches!(result, Err(GraphError::Json(_))));
    }

    #[test]
    fn test_single_record_document() {
        let (resolved, _) = resolve(json!({"id": "a", "name": "A", "type": "Person"}));
        assert_eq!(ids(&resolved), vec!["a"]);
    }

    #[test]
    fn test_character_voice_actor_is_reordered() {
        let (resolved, _) = resolve(json!([
            {"id": "c1", "name": "Character1", "type": "Character", "joinphrase": "(CV: "},
            {"id": "p1", "name": "Person1", "type": "Person", "joinphrase": "), "},
            {"id": "c2", "name": "Character2", "type": "Character", "joinphrase": "(cv. "},
            {"id": "p2", "name": "Person2", "type": "Person", "joinphrase": ")"}
        ]));

        assert_eq!(ids(&resolved), vec!["p1", "c1", "p2", "c2"]);
        assert_eq!(keys(&resolved.roots), vec!["p1", "c1", "p2", "c2"]);
    }

    #[test]
    fn test_child_sequences_are_reordered() {
        let (resolved, _) = resolve(json!([
            {"id": "g", "name": "Unit", "type": "Group", "children": [
                {"id": "c", "name": "Character", "type": "Character", "joinphrase": "(CV "},
                {"id": "p", "name": "Person", "type": "Person", "joinphrase": ")"}
            ]}
        ]));

        let group = &resolved.nodes[resolved.roots[0].node];
        assert_eq!(keys(&group.children), vec!["p", "c"]);
        assert_eq!(ids(&resolved), vec!["g", "p", "c"]);
    }

    #[test]
    fn test_reorder_skips_overlapping_pair() {
        let mut slots = vec![slot("c", "(CV: "), slot("p", ")"), slot("x", ")")];
        assert_eq!(reorder_voice_actor_pairs(&mut slots), 1);
        assert_eq!(keys(&slots), vec!["p", "c", "x"]);
    }

    #[test]
    fn test_reorder_requires_both_joinphrases() {
        let mut slots = vec![slot("a", "(CV: "), slot("b", ", "), slot("c", "; ")];
        assert_eq!(reorder_voice_actor_pairs(&mut slots), 0);
        assert_eq!(keys(&slots), vec!["a", "b", "c"]);

        let mut slots = vec![slot("a", "(CVX"), slot("b", ")")];
        assert_eq!(reorder_voice_actor_pairs(&mut slots), 0);
    }

    #[test]
    fn test_reorder_is_idempotent() {
        let cases = vec![
            vec![slot("c1", "(CV: "), slot("p1", "), "), slot("c2", "(CV: "), slot("p2", ")")],
            vec![slot("a", "(cv "), slot("b", "(cv "), slot("c", ")")],
            vec![slot("c", "(CV."), slot("p", ")"), slot("x", ")")],
            vec![slot("a", ""), slot("b", "(CV:"), slot("c", ") & "), slot("d", "")],
        ];

        for mut slots in cases {
            reorder_voice_actor_pairs(&mut slots);
            let once = slots.clone();
            assert_eq!(reorder_voice_actor_pairs(&mut slots), 0);
            assert_eq!(slots, once);
        }
    }

    #[test]
    fn test_aliases_are_kept() {
        let (resolved, _) = resolve(json!([
            {"id": "p", "name": "P", "type": "Person", "aliases": [
                {"name": "ピー", "locale": "ja", "type": "Artist name", "primary": true}
            ]}
        ]));

        let aliases = resolved.artists[0].snapshot().aliases;
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].locale.as_deref(), Some("ja"));
    }
}
