//! Find and replace across a stack's handlers and text properties.
//!
//! Matches are addressed by find paths of the form
//! `<cardIndex>.<name>.handler.<event>` or `<cardIndex>.<name>.property.<key>`.

use crate::error::{Error, Result};
use crate::id::NodeId;
use crate::model::StackGraph;
use crate::value::PropValue;
use regex::{NoExpand, Regex, RegexBuilder};

/// Properties whose text is searched.
pub const SEARCHABLE_PROPERTIES: &[&str] = &["name", "title", "text", "file"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub match_case: bool,
    pub whole_word: bool,
}

/// Where inside a node a match was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSite {
    Handler(String),
    Property(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub node: NodeId,
    pub card_index: usize,
    pub site: MatchSite,
    /// Find path addressing the searched text.
    pub path: String,
    /// Byte range of the match within the text.
    pub start: usize,
    pub end: usize,
}

/// A whole-text rewrite produced by replace-all.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub node: NodeId,
    pub site: MatchSite,
    pub old: String,
    pub new: String,
}

pub struct Finder {
    regex: Regex,
}

impl Finder {
    /// Literal search for `needle`. Empty needles are rejected.
    pub fn new(needle: &str, options: SearchOptions) -> Result<Self> {
        if needle.is_empty() {
            return Err(Error::invalid("search text must not be empty"));
        }
        let escaped = regex::escape(needle);
        let pattern = if options.whole_word {
            format!(r"\b{escaped}\b")
        } else {
            escaped
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!options.match_case)
            .build()
            .map_err(|e| Error::invalid(e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Every match in the document, cards in order, each card before its
    /// views, handlers before properties.
    pub fn find_all(&self, graph: &StackGraph) -> Vec<SearchMatch> {
        let mut out = Vec::new();
        for (card_index, text_site) in searchable_texts(graph) {
            let TextSite { node, name, site, text } = text_site;
            for m in self.regex.find_iter(&text) {
                out.push(SearchMatch {
                    node,
                    card_index,
                    path: find_path(card_index, &name, &site),
                    site: site.clone(),
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        out
    }

    /// Rewrite `text`, or `None` when nothing matches.
    pub fn replace(&self, text: &str, replacement: &str) -> Option<String> {
        self.regex
            .is_match(text)
            .then(|| self.regex.replace_all(text, NoExpand(replacement)).into_owned())
    }

    /// One rewrite per matching text in the document.
    pub fn replacements(&self, graph: &StackGraph, replacement: &str) -> Vec<Replacement> {
        searchable_texts(graph)
            .into_iter()
            .filter_map(|(_, site)| {
                let new = self.replace(&site.text, replacement)?;
                Some(Replacement {
                    node: site.node,
                    site: site.site,
                    old: site.text,
                    new,
                })
            })
            .collect()
    }
}

struct TextSite {
    node: NodeId,
    name: String,
    site: MatchSite,
    text: String,
}

fn searchable_texts(graph: &StackGraph) -> Vec<(usize, TextSite)> {
    let mut out = Vec::new();
    for (card_index, &card) in graph.children(graph.root()).iter().enumerate() {
        let nodes = std::iter::once(card).chain(graph.descendants(card));
        for idx in nodes {
            let node = graph.node(idx);
            for (event, source) in node.handlers() {
                out.push((
                    card_index,
                    TextSite {
                        node: node.id,
                        name: node.name().to_string(),
                        site: MatchSite::Handler(event.to_string()),
                        text: source.to_string(),
                    },
                ));
            }
            for key in SEARCHABLE_PROPERTIES {
                if let Some(PropValue::Text(text)) = node.get(key) {
                    out.push((
                        card_index,
                        TextSite {
                            node: node.id,
                            name: node.name().to_string(),
                            site: MatchSite::Property((*key).to_string()),
                            text: text.clone(),
                        },
                    ));
                }
            }
        }
    }
    out
}

pub fn find_path(card_index: usize, name: &str, site: &MatchSite) -> String {
    match site {
        MatchSite::Handler(event) => format!("{card_index}.{name}.handler.{event}"),
        MatchSite::Property(key) => format!("{card_index}.{name}.property.{key}"),
    }
}

/// Resolve a find path back to its node and site.
pub fn resolve_find_path(graph: &StackGraph, path: &str) -> Option<(NodeId, MatchSite)> {
    let mut parts = path.rsplitn(3, '.');
    let detail = parts.next()?.to_string();
    let kind = parts.next()?;
    let head = parts.next()?;
    let (card_part, name) = head.split_once('.')?;
    let card = graph.card_at(card_part.parse().ok()?)?;
    let card_idx = graph.index_of(card)?;
    let node = std::iter::once(card_idx)
        .chain(graph.descendants(card_idx))
        .map(|idx| graph.node(idx))
        .find(|n| n.name() == name)?;
    let site = match kind {
        "handler" => MatchSite::Handler(detail),
        "property" => MatchSite::Property(detail),
        _ => return None,
    };
    Some((node.id, site))
}
