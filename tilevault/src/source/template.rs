//! Tile URL templates.
//!
//! Templates use the slippy-map placeholder syntax:
//!
//! | Placeholder | Value                                      |
//! |-------------|--------------------------------------------|
//! | `{s}`       | subdomain chosen for the tile              |
//! | `{z}`       | zoom level                                 |
//! | `{x}`       | column                                     |
//! | `{y}`       | row, origin at the north edge              |
//! | `{-y}`      | row, origin at the south edge (TMS)        |
//! | `{r}`       | retina suffix, always empty                |
//! | `{name}`    | custom parameter                           |

use super::SourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Subdomain,
    Zoom,
    X,
    Y,
    TmsY,
    Retina,
    Param(String),
}

/// A parsed URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parses a template, rejecting unbalanced braces and malformed names.
    pub fn parse(template: &str) -> Result<Self, SourceError> {
        let invalid = |reason: &str| SourceError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(invalid("unmatched '}'"));
            }
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
            let name = &after[..close];

            let segment = match name {
                "s" => Segment::Subdomain,
                "z" => Segment::Zoom,
                "x" => Segment::X,
                "y" => Segment::Y,
                "-y" => Segment::TmsY,
                "r" => Segment::Retina,
                "" => return Err(invalid("empty placeholder")),
                other if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                    Segment::Param(other.to_string())
                }
                _ => return Err(invalid("placeholder names may only contain letters, digits and '_'")),
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the template selects a subdomain per tile.
    pub fn has_subdomain(&self) -> bool {
        self.segments.contains(&Segment::Subdomain)
    }

    /// Names of custom parameters referenced by the template.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl std::fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
