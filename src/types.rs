use std::fmt;

/// The role a manifest item plays in the publication
///
/// The role is derived from the declared media type (and, for the navigation
/// document and the guide's table of contents, from the package document
/// itself), never from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestRole {
    /// An XHTML document that is part of the readable content
    ContentDocument,

    /// Any media type containing "image"
    Image,

    /// Any media type containing "css"
    Stylesheet,

    /// The EPUB 3 navigation document, marked by the `nav` property
    NavigationDocument,

    /// The document referenced by the guide's `type="toc"` reference
    TableOfContentsReference,

    /// Everything else, including the legacy NCX file
    Other,
}

/// Represents a file declared in the package document manifest
///
/// The path is relative to the folder holding the package document, with
/// any URI fragment removed and percent-encoding resolved. Paths are unique
/// within one [`EpubInventory`](crate::manifest::EpubInventory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Normalized path relative to the package document's folder
    pub path: String,

    /// The declared media type
    pub media_type: String,

    /// Optional space-separated properties of the item
    pub properties: Option<String>,

    /// The classification of this entry
    pub role: ManifestRole,
}

impl ManifestEntry {
    /// Returns true if the whitespace-separated properties contain `token`
    pub fn has_property(&self, token: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|item| item == token))
    }
}

/// A detector finding: an original span of text and the text proposed to replace it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suggestion {
    /// The exact span found in the file buffer
    pub original: String,

    /// The proposed replacement for `original`
    pub replacement: String,
}

impl Suggestion {
    pub fn new(original: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            replacement: replacement.into(),
        }
    }
}

/// The lifecycle of one suggestion within a resolution run
///
/// A suggestion starts `Pending` and moves to exactly one terminal state
/// once the user responds to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    Pending,
    Accepted,
    Rejected,

    /// Accepted with a replacement typed by the user
    Edited(String),
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionState::Pending => write!(f, "pending"),
            ResolutionState::Accepted => write!(f, "accepted"),
            ResolutionState::Rejected => write!(f, "rejected"),
            ResolutionState::Edited(_) => write!(f, "edited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{ManifestEntry, ManifestRole, ResolutionState};

    #[test]
    fn test_has_property_matches_whole_tokens() {
        let entry = ManifestEntry {
            path: "nav.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            properties: Some("scripted nav".to_string()),
            role: ManifestRole::NavigationDocument,
        };
        assert!(entry.has_property("nav"));
        assert!(entry.has_property("scripted"));
        assert!(!entry.has_property("na"));

        let entry = ManifestEntry {
            properties: Some("navigation".to_string()),
            ..entry
        };
        assert!(!entry.has_property("nav"));
    }

    #[test]
    fn test_resolution_state_display() {
        assert_eq!(ResolutionState::Pending.to_string(), "pending");
        assert_eq!(ResolutionState::Rejected.to_string(), "rejected");
        assert_eq!(ResolutionState::Edited("x".into()).to_string(), "edited");
    }
}
