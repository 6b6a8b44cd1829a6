//! Structural region replacement over HTML template text
//!
//! Regions are located by element name plus an `id` or `class` token. The
//! start tag is found by a markup scan and its *matching* end tag by a
//! nesting-aware walk over later tags of the same name, so nested or
//! repeated look-alike markup elsewhere in the document is never touched.
//! Only the bytes between the start tag and its end tag are replaced.

use crate::errors::TemplateError;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Dynamic regions of the report document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Timestamp,
    SummaryGrid,
    UserCount,
    TableBody,
    Footer,
    FilterOptions,
}

impl Region {
    /// Regions every template must provide
    pub const REQUIRED: [Region; 5] = [
        Region::Timestamp,
        Region::SummaryGrid,
        Region::UserCount,
        Region::TableBody,
        Region::Footer,
    ];

    pub const ALL: [Region; 6] = [
        Region::Timestamp,
        Region::SummaryGrid,
        Region::UserCount,
        Region::TableBody,
        Region::Footer,
        Region::FilterOptions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::Timestamp => "timestamp",
            Region::SummaryGrid => "summary-grid",
            Region::UserCount => "user-count",
            Region::TableBody => "table-body",
            Region::Footer => "footer",
            Region::FilterOptions => "filter-options",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Region::FilterOptions)
    }

    pub fn anchor(self) -> Anchor {
        match self {
            Region::Timestamp => Anchor::class("p", "report-timestamp"),
            Region::SummaryGrid => Anchor::class("div", "summary-grid"),
            Region::UserCount => Anchor::id("p", "user-count"),
            Region::TableBody => Anchor::id("tbody", "user-table-body"),
            Region::Footer => Anchor::class("footer", "report-footer"),
            Region::FilterOptions => Anchor::id("select", "license-filter"),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrMatch {
    Id(&'static str),
    Class(&'static str),
}

/// Element name plus identifying attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    tag: &'static str,
    attr: AttrMatch,
}

impl Anchor {
    const fn id(tag: &'static str, id: &'static str) -> Self {
        Self {
            tag,
            attr: AttrMatch::Id(id),
        }
    }

    const fn class(tag: &'static str, class: &'static str) -> Self {
        Self {
            tag,
            attr: AttrMatch::Class(class),
        }
    }

    /// Equivalent CSS selector, used for the DOM cross-check
    pub fn selector(&self) -> String {
        match self.attr {
            AttrMatch::Id(id) => format!("{}#{}", self.tag, id),
            AttrMatch::Class(class) => format!("{}.{}", self.tag, class),
        }
    }

    fn matches(&self, tag: &Tag<'_>) -> bool {
        if tag.closing || !tag.name.eq_ignore_ascii_case(self.tag) {
            return false;
        }
        attributes(tag.attrs).any(|(name, value)| match self.attr {
            AttrMatch::Id(id) => name.eq_ignore_ascii_case("id") && value == id,
            AttrMatch::Class(class) => {
                name.eq_ignore_ascii_case("class") && value.split_whitespace().any(|c| c == class)
            }
        })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attr {
            AttrMatch::Id(id) => write!(f, "<{} id=\"{}\">", self.tag, id),
            AttrMatch::Class(class) => write!(f, "<{} class=\"{}\">", self.tag, class),
        }
    }
}

/// A start or end tag found by the markup scan
#[derive(Debug, Clone)]
struct Tag<'a> {
    span: Range<usize>,
    name: &'a str,
    attrs: &'a str,
    closing: bool,
    self_closing: bool,
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("tag pattern is valid")
    })
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("attribute pattern is valid")
    })
}

fn attributes(attrs: &str) -> impl Iterator<Item = (&str, &str)> {
    attribute_pattern().captures_iter(attrs).filter_map(|caps| {
        let name = caps.get(1)?.as_str();
        let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4))?;
        Some((name, value.as_str()))
    })
}

/// Elements whose content is text up to their own end tag
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Every start/end tag outside comments and raw-text element bodies
fn scan_tags(document: &str) -> Vec<Tag<'_>> {
    let mut tags = Vec::new();
    let mut position = 0;

    while let Some(caps) = tag_pattern().captures_at(document, position) {
        let Some(whole) = caps.get(0) else { break };
        position = whole.end();

        let Some(name) = caps.get(2) else {
            continue; // comment
        };
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        let tag = Tag {
            span: whole.range(),
            name: name.as_str(),
            attrs,
            closing: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
            self_closing: attrs.trim_end().ends_with('/'),
        };

        let raw_text = !tag.closing
            && RAW_TEXT_ELEMENTS
                .iter()
                .any(|name| tag.name.eq_ignore_ascii_case(name));
        if raw_text {
            let closing = format!("</{}", tag.name.to_ascii_lowercase());
            position = find_ascii_case_insensitive(document, &closing, position)
                .unwrap_or(document.len());
        }
        tags.push(tag);
    }

    tags
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|offset| from + offset)
}

/// Byte range of the region's inner content, or `None` when the anchor is absent
pub fn locate_region(
    document: &str,
    region: Region,
) -> Result<Option<Range<usize>>, TemplateError> {
    let anchor = region.anchor();
    let tags = scan_tags(document);
    let openings: Vec<usize> = tags
        .iter()
        .enumerate()
        .filter(|(_, tag)| anchor.matches(tag))
        .map(|(index, _)| index)
        .collect();

    match openings.len() {
        0 => return Ok(None),
        1 => {}
        count => {
            return Err(TemplateError::AmbiguousRegion {
                region: region.name().to_string(),
                anchor: anchor.to_string(),
                count,
            })
        }
    }

    let open_index = openings[0];
    let open = &tags[open_index];
    if open.self_closing {
        return Err(TemplateError::UnbalancedRegion {
            region: region.name().to_string(),
            anchor: anchor.to_string(),
        });
    }

    let mut depth = 1usize;
    for tag in &tags[open_index + 1..] {
        if !tag.name.eq_ignore_ascii_case(open.name) || tag.self_closing {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return Ok(Some(open.span.end..tag.span.start));
            }
        } else {
            depth += 1;
        }
    }

    Err(TemplateError::UnbalancedRegion {
        region: region.name().to_string(),
        anchor: anchor.to_string(),
    })
}

/// Replace the inner content of `region`; everything else is kept byte for byte
pub fn replace_region(
    document: &str,
    region: Region,
    content: &str,
) -> Result<String, TemplateError> {
    let range = locate_region(document, region)?.ok_or_else(|| TemplateError::RegionNotFound {
        region: region.name().to_string(),
        anchor: region.anchor().to_string(),
    })?;

    let mut replaced = String::with_capacity(document.len() - range.len() + content.len());
    replaced.push_str(&document[..range.start]);
    replaced.push_str(content);
    replaced.push_str(&document[range.end..]);
    Ok(replaced)
}

/// Cross-check the markup scan against a parsed DOM for each region.
///
/// Required regions must exist exactly once; optional regions at most once.
pub fn verify_structure(document: &str, regions: &[Region]) -> Result<(), TemplateError> {
    let dom = Html::parse_document(document);

    for &region in regions {
        let selector_text = region.anchor().selector();
        let selector = Selector::parse(&selector_text).map_err(|_| TemplateError::InvalidSelector {
            region: region.name().to_string(),
            selector: selector_text.clone(),
        })?;
        let dom_count = dom.select(&selector).count();
        let scanned_count = scan_tags(document)
            .iter()
            .filter(|tag| region.anchor().matches(tag))
            .count();

        if dom_count != scanned_count {
            return Err(TemplateError::StructureMismatch {
                region: region.name().to_string(),
                dom: dom_count,
                scanned: scanned_count,
            });
        }
        if scanned_count == 0 && region.is_required() {
            return Err(TemplateError::RegionNotFound {
                region: region.name().to_string(),
                anchor: region.anchor().to_string(),
            });
        }
        if scanned_count > 1 {
            return Err(TemplateError::AmbiguousRegion {
                region: region.name().to_string(),
                anchor: region.anchor().to_string(),
                count: scanned_count,
            });
        }
    }

    Ok(())
}
