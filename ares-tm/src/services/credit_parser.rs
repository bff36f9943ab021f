//! Credit String Parser
//!
//! Splits free-text artist tag values into registered artists.
//!
//! Every value is tokenized on the credit delimiters, then each token is
//! checked for a voice-actor annotation (`Character (CV: Person)`). Annotated
//! tokens yield the voice actor first, followed by the excluded character.
//! Parsing never fails; the worst case is one artist per unsplit token.

use crate::models::{Artist, ArtistDetails, ArtistRef, ArtistSource, ArtistType, Franchise, IdentityKey};
use crate::registry::IdentityRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid credit pattern {pattern:?}: {e}"))
}

/// Separators between credited names
static DELIMITERS: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\s*[,&;，、×]\s*|\s+and\s+|\s+with\s+|\s*\bfeat(?:uring)?\b\.?\s*")
});

/// Voice-actor annotation including the leading space, e.g. ` (CV: Person)`
static CV_ANNOTATION: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\s?[(（]cv[:.：]?\s?.*[)）]"));

/// Name inside a voice-actor annotation
static CV_NAME: Lazy<Regex> = Lazy::new(|| compile(r"(?i)[(（]cv[:.：]?\s?([^)）]+)[)）]"));

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| compile(r"^\((.*)\)$"));

/// One credited name before registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCredit {
    pub name: String,
    pub kind: ArtistType,
    pub include: bool,
}

impl ParsedCredit {
    fn person(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArtistType::Person,
            include: true,
        }
    }

    fn character(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArtistType::Character,
            include: false,
        }
    }
}

/// Split tag values into tokens, in order, across all values
pub fn tokenize(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| DELIMITERS.split(value))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a token around its voice-actor annotation, voice actor first
fn split_voice_actor(token: &str) -> Vec<String> {
    let mut parts: Vec<String> = match CV_ANNOTATION.find(token) {
        Some(m) => vec![&token[..m.start()], m.as_str(), &token[m.end()..]]
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        None => vec![token.trim().to_string()],
    };
    parts.reverse();
    parts
}

fn is_voice_actor(part: &str) -> bool {
    let lower = part.trim().to_lowercase();
    lower.starts_with("(cv") || lower.starts_with("（cv")
}

fn voice_actor_name(part: &str) -> String {
    CV_NAME
        .captures(part)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Classify the parts of one token
///
/// With several parts, only an annotation is a person; everything else is
/// a character. A single part is a person unless it is fully wrapped in
/// ASCII parentheses.
fn classify(parts: Vec<String>) -> Vec<ParsedCredit> {
    if parts.len() > 1 {
        return parts
            .into_iter()
            .map(|part| {
                if is_voice_actor(&part) {
                    ParsedCredit::person(voice_actor_name(&part))
                } else {
                    ParsedCredit::character(part)
                }
            })
            .collect();
    }

    parts
        .into_iter()
        .map(|part| {
            if is_voice_actor(&part) {
                return ParsedCredit::person(voice_actor_name(&part));
            }
            match PARENTHESIZED.captures(&part).and_then(|caps| caps.get(1)) {
                Some(inner) => ParsedCredit::character(inner.as_str()),
                None => ParsedCredit::person(part.clone()),
            }
        })
        .collect()
}

/// Parse tag values into credits, without registering them
pub fn split_credits(values: &[String]) -> Vec<ParsedCredit> {
    tokenize(values)
        .iter()
        .flat_map(|token| {
            let credits = classify(split_voice_actor(token));
            trace!(token = %token, credits = credits.len(), "Split credit token");
            credits
        })
        .filter(|credit| !credit.name.trim().is_empty())
        .collect()
}

/// Registers parsed credits under a franchise namespace
pub struct CreditParser<'a> {
    registry: &'a IdentityRegistry,
}

impl<'a> CreditParser<'a> {
    pub fn new(registry: &'a IdentityRegistry) -> Self {
        Self { registry }
    }

    /// Parse and register; repeated names map to the same artist
    pub fn parse(&self, values: &[String], franchise: &Franchise) -> Vec<ArtistRef> {
        let artists: Vec<ArtistRef> = split_credits(values)
            .into_iter()
            .map(|credit| self.register(credit, franchise))
            .collect();

        debug!(
            franchise = %franchise.name,
            values = values.len(),
            artists = artists.len(),
            "Parsed credit strings"
        );
        artists
    }

    fn register(&self, credit: ParsedCredit, franchise: &Franchise) -> ArtistRef {
        let name = credit.name.trim().to_string();
        let key = IdentityKey::text(&name, franchise.id);
        let details = ArtistDetails::new(name.clone(), credit.kind, credit.include, name);
        let source = ArtistSource::Text {
            franchise: franchise.name.clone(),
            franchise_id: franchise.id,
        };
        self.registry.register(Artist::new(key, source, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn person(name: &str) -> ParsedCredit {
        ParsedCredit::person(name)
    }

    fn character(name: &str) -> ParsedCredit {
        ParsedCredit::character(name)
    }

    fn franchise(id: i64, name: &str) -> Franchise {
        Franchise {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_split_mixed_credit_list() {
        let values = strings(&[
            "Artist1",
            "Artist2 feat. Artist3 & Artist4",
            "Character1 (CV: Artist5); Character2(CV.Artist6); (Character 3)",
            "Character4(CV.Artist7)",
            "(CV: Artist8)",
            "Character5（CV：Artist9）",
        ]);

        assert_eq!(
            split_credits(&values),
            vec![
                person("Artist1"),
                person("Artist2"),
                person("Artist3"),
                person("Artist4"),
                person("Artist5"),
                character("Character1"),
                person("Artist6"),
                character("Character2"),
                character("Character 3"),
                person("Artist7"),
                character("Character4"),
                person("Artist8"),
                person("Artist9"),
                character("Character5"),
            ]
        );
    }

    #[test]
    fn test_voice_actor_comes_first() {
        assert_eq!(
            split_credits(&strings(&["Character1 (CV: Artist5)"])),
            vec![person("Artist5"), character("Character1")]
        );
    }

    #[test]
    fn test_lone_annotation_is_one_person() {
        assert_eq!(split_credits(&strings(&["(CV: Artist8)"])), vec![person("Artist8")]);
    }

    #[test]
    fn test_word_delimiters() {
        assert_eq!(
            tokenize(&strings(&["A and B with C featuring D feat E", "F×G、H，I"])),
            strings(&["A", "B", "C", "D", "E", "F", "G", "H", "I"])
        );
    }

    #[test]
    fn test_delimiter_words_inside_names_are_kept() {
        assert_eq!(
            tokenize(&strings(&["Within Temptation", "Sandman", "Defeated"])),
            strings(&["Within Temptation", "Sandman", "Defeated"])
        );
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        assert!(split_credits(&strings(&["", " ; , "])).is_empty());
        assert!(split_credits(&strings(&["(CV)"])).is_empty());
    }

    #[test]
    fn test_same_name_same_franchise_is_one_artist() {
        let registry = IdentityRegistry::new();
        let parser = CreditParser::new(&registry);
        let f = franchise(2, "F1");

        let first = parser.parse(&strings(&["Artist1"]), &f);
        let second = parser.parse(&strings(&["Artist1 & Artist2"]), &f);

        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_same_name_other_franchise_is_distinct() {
        let registry = IdentityRegistry::new();
        let parser = CreditParser::new(&registry);

        let a = parser.parse(&strings(&["Artist1"]), &franchise(1, "_"));
        let b = parser.parse(&strings(&["Artist1"]), &franchise(2, "F1"));

        assert!(!Arc::ptr_eq(&a[0], &b[0]));
        assert_eq!(
            b[0].source(),
            &ArtistSource::Text {
                franchise: "F1".to_string(),
                franchise_id: 2
            }
        );
    }

    #[test]
    fn test_registered_details() {
        let registry = IdentityRegistry::new();
        let artists = CreditParser::new(&registry).parse(&strings(&["Char (CV: Person)"]), &franchise(1, "_"));

        assert_eq!(artists.len(), 2);
        let person = artists[0].snapshot();
        assert_eq!(person.custom_name, "Person");
        assert!(person.include);
        assert_eq!(person.custom_original_name, None);
        assert_eq!(artists[1].kind(), ArtistType::Character);
        assert_eq!(artists[1].formatted_artist(), "(Char)");
    }
}
