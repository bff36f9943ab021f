//! Customization store payloads
//!
//! Field names follow the store's JSON (camelCase).

use serde::{Deserialize, Serialize};

/// Stored customization for a graph-sourced artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphArtistRecord {
    pub id: i64,
    #[serde(default, alias = "mbid")]
    pub mb_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub original_name: Option<String>,
    pub include: bool,
}

/// Create/update body for a graph-sourced artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphArtistPayload {
    pub mb_id: String,
    pub name: String,
    pub original_name: Option<String>,
    pub include: bool,
}

/// Stored text-sourced ("simple") artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleArtistRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleArtistPayload {
    pub name: String,
}

/// Franchise-scoped alias pointing at a simple artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    pub id: i64,
    pub name: String,
    pub artist_id: i64,
    /// Name of the artist the alias points to, when the store embeds it
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub franchise_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasPayload {
    pub name: String,
    pub artist_id: i64,
    pub franchise_id: i64,
}

/// Alias names are stored with all spaces removed
pub fn alias_name(name: &str) -> String {
    name.replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_record_accepts_both_id_spellings() {
        let a: GraphArtistRecord = serde_json::from_str(
            r#"{"id": 35, "mbId": "x", "name": "N", "originalName": "O", "include": true}"#,
        )
        .unwrap();
        let b: GraphArtistRecord = serde_json::from_str(
            r#"{"id": 35, "mbid": "x", "name": "N", "originalName": "O", "include": true}"#,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_field_names() {
        let payload = AliasPayload {
            name: "Artist1".to_string(),
            artist_id: 7,
            franchise_id: 2,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["artistId"], 7);
        assert_eq!(json["franchiseId"], 2);
    }

    #[test]
    fn test_alias_name_strips_spaces() {
        assert_eq!(alias_name("Character 3 Name"), "Character3Name");
    }
}
