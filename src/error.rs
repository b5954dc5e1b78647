//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while reading
//! the package document, rewriting an archive, running detectors or resolving
//! suggestions. All errors are uniformly wrapped in the `EpubError`
//! enumeration for convenient error handling by the caller.
//!
//! The variants fall into four groups:
//!
//! - Structural errors: the archive or its package document is unusable.
//! - Policy errors: the caller asked for something that cannot be run.
//! - Per-suggestion errors: a single detector finding failed validation.
//! - I/O errors: reading, writing or renaming failed.

use thiserror::Error;

/// Types of errors that can occur during EPUB processing
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when processing the ZIP structure of EPUB files,
    /// such as file corruption, unreadability, etc.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// A section-break indicator was required but the supplied value is blank
    #[error("Section break indicator: a non-blank indicator is required for section break detection.")]
    BlankSectionBreakIndicator,

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to parse an empty XML document.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    /// The XML document ended before its root element was closed
    #[error("Malformed markup: The document ended before the root element was closed.")]
    IncompleteMarkup,

    /// A stylesheet index outside the offered list was chosen
    #[error("Invalid stylesheet selection: {index} is not in the range of {available} stylesheets.")]
    InvalidStylesheetSelection { index: usize, available: usize },

    /// A manifest href could not be decoded into a UTF-8 path
    #[error("Invalid href: \"{href}\" does not decode to a valid UTF-8 path.")]
    InvalidHref { href: String },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// XML parsing failure error
    ///
    /// Wraps the underlying parser error when the package document
    /// is not well-formed.
    #[error("Malformed markup: {source}")]
    MalformedMarkup { source: quick_xml::Error },

    /// The container has no `mimetype` entry
    #[error("Missing mimetype: The archive does not contain a \"mimetype\" entry.")]
    MissingMimetype,

    /// Missing required attribute error
    ///
    /// Triggered when an XML element in the package document lacks an
    /// attribute that this crate depends on.
    #[error(
        "Missing required attribute: The \"{attribute}\" attribute is a must attribute for the \"{tag}\" element."
    )]
    MissingRequiredAttribute { tag: String, attribute: String },

    /// The detector configuration enables nothing
    #[error("No detector enabled: At least one detector must be enabled.")]
    NoDetectorEnabled,

    /// The manifest section exists but declares no items
    #[error("Non-canonical file: The manifest does not declare any items.")]
    NoManifestItems,

    /// The package document has no manifest section
    #[error("Non-canonical file: The \"manifest\" element was not found.")]
    NoManifestSection,

    /// An accepted break suggestion needs a stylesheet rule, but the book has no stylesheet
    #[error("No stylesheet available: An accepted break requires a stylesheet, but the manifest has none.")]
    NoStylesheetAvailable,

    /// The package element has no (or a blank) version attribute
    #[error("Unrecognized EPUB version: The package element does not declare a version.")]
    NoVersionDeclared,

    /// No archive entry looks like a package document
    #[error("Package document not found: No \".opf\" file was found in the archive.")]
    PackageDocumentNotFound,

    /// Relative link leak error
    ///
    /// This error occurs when a relative path link is outside the scope
    /// of an EPUB container, which is a security protection mechanism.
    #[error("Relative link leakage: Path \"{path}\" is out of container range.")]
    RelativeLinkLeakage { path: String },

    /// Unable to find the resource error
    ///
    /// This error occurs when an attempt is made to read a file
    /// that does not exist in the container.
    #[error("Resource not found: Unable to find resource from \"{resource}\".")]
    ResourceNotFound { resource: String },

    /// A repaired paragraph does not have matching opening and closing quotes
    #[error("Unbalanced quotes: The repaired text \"{paragraph}\" has unmatched quotation marks.")]
    UnbalancedQuotes { paragraph: String },

    /// A detector name that is not registered
    #[error("Unknown detector: \"{name}\" is not a known detector.")]
    UnknownDetector { name: String },

    /// Unrecognized EPUB version error
    ///
    /// The version attribute exists but its integer part is not a number.
    #[error("Unrecognized EPUB version: Unable to read a major version from \"{version}\".")]
    UnrecognizedEpubVersion { version: String },

    /// UTF-8 decoding error
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// UTF-16 decoding error
    #[error("Decode error: {source}")]
    Utf16DecodeError { source: std::string::FromUtf16Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::MalformedMarkup { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

impl From<std::string::FromUtf16Error> for EpubError {
    fn from(value: std::string::FromUtf16Error) -> Self {
        EpubError::Utf16DecodeError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::InvalidStylesheetSelection {
                    index: l_index,
                    available: l_available,
                },
                Self::InvalidStylesheetSelection {
                    index: r_index,
                    available: r_available,
                },
            ) => l_index == r_index && l_available == r_available,
            (Self::InvalidHref { href: l_href }, Self::InvalidHref { href: r_href }) => {
                l_href == r_href
            }
            (
                Self::MissingRequiredAttribute {
                    tag: l_tag,
                    attribute: l_attribute,
                },
                Self::MissingRequiredAttribute {
                    tag: r_tag,
                    attribute: r_attribute,
                },
            ) => l_tag == r_tag && l_attribute == r_attribute,
            (
                Self::RelativeLinkLeakage { path: l_path },
                Self::RelativeLinkLeakage { path: r_path },
            ) => l_path == r_path,
            (
                Self::ResourceNotFound {
                    resource: l_resource,
                },
                Self::ResourceNotFound {
                    resource: r_resource,
                },
            ) => l_resource == r_resource,
            (
                Self::UnbalancedQuotes {
                    paragraph: l_paragraph,
                },
                Self::UnbalancedQuotes {
                    paragraph: r_paragraph,
                },
            ) => l_paragraph == r_paragraph,
            (Self::UnknownDetector { name: l_name }, Self::UnknownDetector { name: r_name }) => {
                l_name == r_name
            }
            (
                Self::UnrecognizedEpubVersion { version: l_version },
                Self::UnrecognizedEpubVersion { version: r_version },
            ) => l_version == r_version,
            (
                Self::Utf8DecodeError { source: l_source },
                Self::Utf8DecodeError { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
