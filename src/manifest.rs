//! Package document inventory
//!
//! Parses the OPF package document into an [`EpubInventory`]: every manifest
//! item keyed by its normalized path, partitioned by role, together with the
//! format version and the locations of the navigation files.

use indexmap::{IndexMap, IndexSet};
use log::warn;

use crate::{
    error::EpubError,
    types::{ManifestEntry, ManifestRole},
    utils::{XmlElement, XmlReader, normalize_href, parent_folder, resolve_container_path},
};

/// The manifest of one EPUB publication
///
/// All paths stored here are relative to the package document's folder.
/// Use [`EpubInventory::archive_path`] to turn them into container paths.
#[derive(Debug, Clone)]
pub struct EpubInventory {
    /// The major format version, the integer part of the declared version
    pub version: u32,

    /// The container path of the package document, empty when parsed standalone
    pub package_path: String,

    /// The folder holding the package document, empty for the container root
    pub base_path: String,

    /// Every manifest entry in declaration order, keyed by path
    pub entries: IndexMap<String, ManifestEntry>,

    /// The EPUB 3 navigation document, if declared
    pub nav_path: Option<String>,

    /// The href of the first guide reference with `type="toc"`
    pub toc_reference: Option<String>,

    /// The legacy NCX file, if declared
    pub ncx_path: Option<String>,

    content_documents: IndexSet<String>,
    stylesheets: IndexSet<String>,
}

impl EpubInventory {
    /// Parses a package document that is not tied to a container location
    pub fn parse(xml: &str) -> Result<Self, EpubError> {
        Self::parse_package("", xml)
    }

    /// Parses the package document found at `package_path` in the container
    ///
    /// # Parameters
    /// - `package_path`: Container path of the OPF file, e.g. `OEBPS/content.opf`
    /// - `xml`: The decoded package document
    ///
    /// # Return
    /// - `Ok(EpubInventory)`: The parsed inventory
    /// - `Err(EpubError)`: The document is malformed, declares no version,
    ///   has no manifest, or the manifest is empty
    pub fn parse_package(package_path: &str, xml: &str) -> Result<Self, EpubError> {
        let package = XmlReader::parse(xml)?;
        let version = Self::determine_version(&package)?;

        let mut inventory = Self {
            version,
            package_path: package_path.to_string(),
            base_path: parent_folder(package_path).to_string(),
            entries: IndexMap::new(),
            nav_path: None,
            toc_reference: None,
            ncx_path: None,
            content_documents: IndexSet::new(),
            stylesheets: IndexSet::new(),
        };

        let manifest = package
            .find_elements_by_name("manifest")
            .next()
            .ok_or(EpubError::NoManifestSection)?;
        inventory.parse_manifest(manifest)?;

        inventory.toc_reference = Self::find_toc_reference(&package)?;
        if let Some(toc) = inventory.toc_reference.clone() {
            inventory.assign_role(&toc, ManifestRole::TableOfContentsReference);
        }

        Ok(inventory)
    }

    /// Reads the major version from the package element
    ///
    /// "3.0" yields 3, "2.0.1" yields 2. A missing or blank attribute is
    /// `NoVersionDeclared`; a non-numeric integer part is `UnrecognizedEpubVersion`.
    fn determine_version(package: &XmlElement) -> Result<u32, EpubError> {
        let version = package
            .get_attr("version")
            .filter(|version| !version.trim().is_empty())
            .ok_or(EpubError::NoVersionDeclared)?;

        let major = version.trim().split('.').next().unwrap_or_default();
        major
            .parse::<u32>()
            .map_err(|_| EpubError::UnrecognizedEpubVersion {
                version: version.clone(),
            })
    }

    /// Parse the manifest section
    ///
    /// Classification follows the media type: "xhtml" wins over "image",
    /// which wins over "css". In version 3 documents an item with the `nav`
    /// property is the navigation document whatever its media type.
    fn parse_manifest(&mut self, manifest: &XmlElement) -> Result<(), EpubError> {
        let mut item_count = 0;

        for element in manifest.find_children_by_name("item") {
            item_count += 1;

            let href = element
                .get_attr("href")
                .ok_or_else(|| EpubError::MissingRequiredAttribute {
                    tag: element.tag_name(),
                    attribute: "href".to_string(),
                })?;
            let media_type =
                element
                    .get_attr("media-type")
                    .ok_or_else(|| EpubError::MissingRequiredAttribute {
                        tag: element.tag_name(),
                        attribute: "media-type".to_string(),
                    })?;
            let properties = element.get_attr("properties");
            let path = normalize_href(&href)?;

            if self.entries.contains_key(&path) {
                warn!("Manifest declares \"{}\" more than once; keeping the first item.", path);
                continue;
            }

            let mut entry = ManifestEntry {
                path: path.clone(),
                media_type,
                properties,
                role: ManifestRole::Other,
            };

            entry.role = if self.version >= 3 && entry.has_property("nav") {
                self.nav_path = Some(path.clone());
                ManifestRole::NavigationDocument
            } else {
                classify_media_type(&entry.media_type)
            };

            if entry.role == ManifestRole::Other && path.ends_with(".ncx") {
                self.ncx_path = Some(path.clone());
            }

            match entry.role {
                ManifestRole::ContentDocument => {
                    self.content_documents.insert(path.clone());
                }
                ManifestRole::Stylesheet => {
                    self.stylesheets.insert(path.clone());
                }
                _ => {}
            }

            self.entries.insert(path, entry);
        }

        if item_count == 0 {
            return Err(EpubError::NoManifestItems);
        }

        Ok(())
    }

    /// Finds the href of the first `type="toc"` reference in the guide or landmarks section
    fn find_toc_reference(package: &XmlElement) -> Result<Option<String>, EpubError> {
        let section = package
            .find_elements_by_name("guide")
            .next()
            .or_else(|| package.find_elements_by_name("landmarks").next());

        let Some(section) = section else {
            return Ok(None);
        };

        section
            .find_elements_by_name("reference")
            .find(|reference| reference.get_attr("type").as_deref() == Some("toc"))
            .and_then(|reference| reference.get_attr("href"))
            .map(|href| normalize_href(&href))
            .transpose()
    }

    /// Moves an existing entry into a navigation role, out of the role sets
    fn assign_role(&mut self, path: &str, role: ManifestRole) {
        if let Some(entry) = self.entries.get_mut(path) {
            if entry.role == ManifestRole::NavigationDocument {
                return;
            }
            entry.role = role;
            self.content_documents.shift_remove(path);
            self.stylesheets.shift_remove(path);
        }
    }

    /// Maps a manifest path onto its container path
    pub fn archive_path(&self, relative: &str) -> Result<String, EpubError> {
        resolve_container_path(&self.base_path, relative)
    }

    /// Content documents in manifest order
    pub fn content_documents(&self) -> impl Iterator<Item = &str> {
        self.content_documents.iter().map(String::as_str)
    }

    /// Stylesheets in manifest order
    pub fn stylesheets(&self) -> impl Iterator<Item = &str> {
        self.stylesheets.iter().map(String::as_str)
    }
}

fn classify_media_type(media_type: &str) -> ManifestRole {
    if media_type.contains("xhtml") {
        ManifestRole::ContentDocument
    } else if media_type.contains("image") {
        ManifestRole::Image
    } else if media_type.contains("css") {
        ManifestRole::Stylesheet
    } else {
        ManifestRole::Other
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::EpubError, manifest::EpubInventory, types::ManifestRole};

    fn paths_with_role(inventory: &EpubInventory, role: ManifestRole) -> Vec<&str> {
        inventory
            .entries
            .values()
            .filter(|entry| entry.role == role)
            .map(|entry| entry.path.as_str())
            .collect()
    }

    const EPUB3_PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test</dc:title>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="toc" href="Text/toc.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="Text/chapter%201.xhtml#start" media-type="application/xhtml+xml"/>
    <item id="c2" href="Text/chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover" href="Images/cover.jpg" media-type="image/jpeg"/>
    <item id="svg" href="Images/map.svg" media-type="image/svg+xml"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="font" href="Fonts/a.otf" media-type="font/otf"/>
  </manifest>
  <spine toc="ncx"><itemref idref="c1"/></spine>
  <guide>
    <reference type="cover" href="Text/cover.xhtml"/>
    <reference type="toc" href="Text/toc.xhtml#top"/>
  </guide>
</package>"#;

    #[test]
    fn test_parse_epub3_inventory() {
        let inventory = EpubInventory::parse_package("OEBPS/content.opf", EPUB3_PACKAGE).unwrap();

        assert_eq!(inventory.version, 3);
        assert_eq!(inventory.base_path, "OEBPS");
        assert_eq!(inventory.entries.len(), 9);
        assert_eq!(inventory.nav_path.as_deref(), Some("nav.xhtml"));
        assert_eq!(inventory.toc_reference.as_deref(), Some("Text/toc.xhtml"));
        assert_eq!(inventory.ncx_path.as_deref(), Some("toc.ncx"));

        assert_eq!(
            inventory.content_documents().collect::<Vec<_>>(),
            vec!["Text/chapter 1.xhtml", "Text/chapter2.xhtml"]
        );
        assert_eq!(
            paths_with_role(&inventory, ManifestRole::Image),
            vec!["Images/cover.jpg", "Images/map.svg"]
        );
        assert_eq!(
            inventory.stylesheets().collect::<Vec<_>>(),
            vec!["Styles/main.css"]
        );

        assert_eq!(
            inventory.entries["nav.xhtml"].role,
            ManifestRole::NavigationDocument
        );
        assert_eq!(
            inventory.entries["Text/toc.xhtml"].role,
            ManifestRole::TableOfContentsReference
        );
        assert_eq!(inventory.entries["toc.ncx"].role, ManifestRole::Other);
        assert_eq!(inventory.entries["Fonts/a.otf"].role, ManifestRole::Other);
    }

    #[test]
    fn test_archive_path() {
        let inventory = EpubInventory::parse_package("OEBPS/content.opf", EPUB3_PACKAGE).unwrap();
        assert_eq!(
            inventory.archive_path("Text/chapter2.xhtml").unwrap(),
            "OEBPS/Text/chapter2.xhtml"
        );
        assert_eq!(
            inventory.archive_path("../mimetype").unwrap(),
            "mimetype"
        );

        let inventory = EpubInventory::parse(EPUB3_PACKAGE).unwrap();
        assert_eq!(inventory.archive_path("nav.xhtml").unwrap(), "nav.xhtml");
    }

    #[test]
    fn test_classification_follows_media_type_not_extension() {
        let package = r#"<package version="2.0"><manifest>
            <item id="a" href="looks-like.jpg" media-type="application/xhtml+xml"/>
            <item id="b" href="looks-like.css" media-type="application/xhtml+xml"/>
            <item id="c" href="style.txt" media-type="text/css"/>
        </manifest></package>"#;
        let inventory = EpubInventory::parse(package).unwrap();

        assert!(paths_with_role(&inventory, ManifestRole::Image).is_empty());
        assert_eq!(inventory.stylesheets().collect::<Vec<_>>(), vec!["style.txt"]);
        assert_eq!(
            inventory.content_documents().collect::<Vec<_>>(),
            vec!["looks-like.jpg", "looks-like.css"]
        );
    }

    #[test]
    fn test_nav_property_only_counts_in_version_3() {
        let package = r#"<package version="2.0"><manifest>
            <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
        </manifest></package>"#;
        let inventory = EpubInventory::parse(package).unwrap();
        assert_eq!(inventory.version, 2);
        assert!(inventory.nav_path.is_none());
        assert_eq!(
            inventory.entries["nav.xhtml"].role,
            ManifestRole::ContentDocument
        );

        let package = r#"<package version="3.0"><manifest>
            <item id="nav" href="nav.html" media-type="text/html" properties="nav"/>
        </manifest></package>"#;
        let inventory = EpubInventory::parse(package).unwrap();
        assert_eq!(inventory.nav_path.as_deref(), Some("nav.html"));
    }

    #[test]
    fn test_duplicate_paths_keep_first() {
        let package = r#"<package version="3.0"><manifest>
            <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
            <item id="b" href="a.xhtml#x" media-type="text/css"/>
        </manifest></package>"#;
        let inventory = EpubInventory::parse(package).unwrap();
        assert_eq!(inventory.entries.len(), 1);
        assert_eq!(inventory.stylesheets().count(), 0);
    }

    #[test]
    fn test_version_errors() {
        let missing = r#"<package><manifest><item href="a" media-type="b"/></manifest></package>"#;
        assert_eq!(
            EpubInventory::parse(missing).unwrap_err(),
            EpubError::NoVersionDeclared
        );

        let blank = r#"<package version="  "><manifest><item href="a" media-type="b"/></manifest></package>"#;
        assert_eq!(
            EpubInventory::parse(blank).unwrap_err(),
            EpubError::NoVersionDeclared
        );

        let garbage = r#"<package version="x.1"><manifest><item href="a" media-type="b"/></manifest></package>"#;
        assert_eq!(
            EpubInventory::parse(garbage).unwrap_err(),
            EpubError::UnrecognizedEpubVersion {
                version: "x.1".to_string()
            }
        );

        let patch = r#"<package version="2.0.1"><manifest><item href="a" media-type="b"/></manifest></package>"#;
        assert_eq!(EpubInventory::parse(patch).unwrap().version, 2);
    }

    #[test]
    fn test_manifest_errors() {
        let no_manifest = r#"<package version="3.0"><metadata/></package>"#;
        assert_eq!(
            EpubInventory::parse(no_manifest).unwrap_err(),
            EpubError::NoManifestSection
        );

        let empty_manifest = r#"<package version="3.0"><manifest></manifest></package>"#;
        assert_eq!(
            EpubInventory::parse(empty_manifest).unwrap_err(),
            EpubError::NoManifestItems
        );

        let missing_href = r#"<package version="3.0"><manifest><item media-type="text/css"/></manifest></package>"#;
        assert_eq!(
            EpubInventory::parse(missing_href).unwrap_err(),
            EpubError::MissingRequiredAttribute {
                tag: "item".to_string(),
                attribute: "href".to_string()
            }
        );

        let malformed = r#"<package version="3.0"><manifest></package>"#;
        assert!(matches!(
            EpubInventory::parse(malformed),
            Err(EpubError::MalformedMarkup { .. })
        ));
    }
}
