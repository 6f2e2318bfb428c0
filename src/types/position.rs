//! Alignment keys.
//!
//! A [`Position`] identifies "the same thing" across raters. Two units from
//! different raters are compared iff their positions are equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Character offsets `[begin, end)` of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Begin offset (inclusive).
    pub begin: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl Extent {
    /// Create a new extent.
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Length of the extent in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    /// Whether the extent covers no characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Discriminating part of a link position.
///
/// Depending on the link compare behaviour either the role or the target
/// extent is part of the key; the other one is compared as the label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    /// Name of the link feature on the host.
    pub feature: String,
    /// Role of the link, when roles discriminate positions.
    pub role: Option<String>,
    /// Target extent, when targets discriminate positions.
    pub target: Option<Extent>,
}

/// Alignment key produced by a layer discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    /// A span annotation, or one link slot of a span annotation.
    Span {
        /// Document the annotation belongs to.
        document: String,
        /// Layer name.
        layer: String,
        /// Offsets of the span (the host, for link slots).
        extent: Extent,
        /// Link slot, if this position is a link of the host.
        link: Option<LinkKey>,
    },
    /// A relation, keyed by its attachment points.
    Relation {
        /// Document the annotation belongs to.
        document: String,
        /// Layer name.
        layer: String,
        /// Extent of the source endpoint.
        source: Extent,
        /// Extent of the target endpoint.
        target: Extent,
    },
    /// The arc between two consecutive elements of a chain.
    ChainArc {
        /// Document the annotation belongs to.
        document: String,
        /// Layer name.
        layer: String,
        /// Extent of the element the arc starts at.
        from: Extent,
        /// Extent of the next element.
        to: Extent,
    },
}

impl Position {
    /// Document the position belongs to.
    pub fn document(&self) -> &str {
        match self {
            Self::Span { document, .. }
            | Self::Relation { document, .. }
            | Self::ChainArc { document, .. } => document,
        }
    }

    /// Layer the position belongs to.
    pub fn layer(&self) -> &str {
        match self {
            Self::Span { layer, .. } | Self::Relation { layer, .. } | Self::ChainArc { layer, .. } => {
                layer
            }
        }
    }

    /// Link slot of the position, if any.
    pub fn link(&self) -> Option<&LinkKey> {
        match self {
            Self::Span { link, .. } => link.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Span { document, layer, extent, link } => {
                write!(f, "{}[{}] {}", layer, document, extent)?;
                if let Some(link) = link {
                    write!(f, " {}", link.feature)?;
                    if let Some(role) = &link.role {
                        write!(f, "[{}]", role)?;
                    }
                    if let Some(target) = &link.target {
                        write!(f, " -> {}", target)?;
                    }
                }
                Ok(())
            }
            Self::Relation { document, layer, source, target } => {
                write!(f, "{}[{}] {} -> {}", layer, document, source, target)
            }
            Self::ChainArc { document, layer, from, to } => {
                write!(f, "{}[{}] {} ~> {}", layer, document, from, to)
            }
        }
    }
}
