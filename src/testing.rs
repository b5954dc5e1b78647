//! Archive fixtures shared by the unit tests

use std::{
    fs::File,
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
};

use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

/// Writes a zip archive with the given entries, in order
pub(crate) fn write_archive(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);

    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }

    zip.finish().unwrap();
}

/// Reads every entry of an archive as (name, compression, raw compressed bytes)
pub(crate) fn raw_entries(path: &Path) -> Vec<(String, CompressionMethod, Vec<u8>)> {
    let data = std::fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();

    (0..archive.len())
        .map(|index| {
            let mut entry = archive.by_index_raw(index).unwrap();
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).unwrap();
            (entry.name().to_string(), entry.compression(), raw)
        })
        .collect()
}

/// Reads one entry of an archive, decompressed
pub(crate) fn read_entry_bytes(path: &Path, name: &str) -> Vec<u8> {
    let data = std::fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Reads one UTF-8 entry of an archive, decompressed
pub(crate) fn read_entry(path: &Path, name: &str) -> String {
    String::from_utf8(read_entry_bytes(path, name)).unwrap()
}

/// Wraps paragraphs into a minimal XHTML document
pub(crate) fn xhtml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>t</title></head>\n<body>\n{}\n</body>\n</html>\n",
        body
    )
}

/// Builder for a small EPUB 3 laid out under `OEBPS/`
#[derive(Default)]
pub(crate) struct EpubFixture {
    chapters: Vec<(String, Vec<u8>)>,
    stylesheets: Vec<(String, String)>,
}

impl EpubFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `OEBPS/Text/{name}` with the given full document text
    pub(crate) fn chapter(mut self, name: &str, document: &str) -> Self {
        self.chapters.push((name.to_string(), document.as_bytes().to_vec()));
        self
    }

    /// Adds `OEBPS/Text/{name}` with raw, possibly non-UTF-8 content
    pub(crate) fn chapter_bytes(mut self, name: &str, document: &[u8]) -> Self {
        self.chapters.push((name.to_string(), document.to_vec()));
        self
    }

    /// Adds `OEBPS/Styles/{name}`
    pub(crate) fn stylesheet(mut self, name: &str, css: &str) -> Self {
        self.stylesheets.push((name.to_string(), css.to_string()));
        self
    }

    pub(crate) fn package_document(&self) -> String {
        let mut items = String::from(
            "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
        );
        for (index, (name, _)) in self.chapters.iter().enumerate() {
            items.push_str(&format!(
                "    <item id=\"c{}\" href=\"Text/{}\" media-type=\"application/xhtml+xml\"/>\n",
                index, name
            ));
        }
        for (index, (name, _)) in self.stylesheets.iter().enumerate() {
            items.push_str(&format!(
                "    <item id=\"s{}\" href=\"Styles/{}\" media-type=\"text/css\"/>\n",
                index, name
            ));
        }
        items.push_str(
            "    <item id=\"cover\" href=\"Images/cover.png\" media-type=\"image/png\"/>\n",
        );

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\">\n  <manifest>\n{}  </manifest>\n  <spine/>\n</package>\n",
            items
        )
    }

    /// Writes the archive to `dir/book.epub` and returns its path
    pub(crate) fn build(&self, dir: &Path) -> PathBuf {
        let path = dir.join("book.epub");
        let container = "<?xml version=\"1.0\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\"><rootfiles><rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/></rootfiles></container>";
        let package = self.package_document();
        let nav = xhtml("<nav epub:type=\"toc\"><ol><li><a href=\"Text/c.xhtml\">One</a></li></ol></nav>");
        let cover: &[u8] = &[0x89, b'P', b'N', b'G', 0, 1, 2, 3, 4, 5, 6, 7];

        let mut owned: Vec<(String, Vec<u8>, CompressionMethod)> = vec![
            (
                "mimetype".to_string(),
                b"application/epub+zip".to_vec(),
                CompressionMethod::Stored,
            ),
            (
                "META-INF/container.xml".to_string(),
                container.as_bytes().to_vec(),
                CompressionMethod::Deflated,
            ),
            (
                "OEBPS/content.opf".to_string(),
                package.into_bytes(),
                CompressionMethod::Deflated,
            ),
            (
                "OEBPS/nav.xhtml".to_string(),
                nav.into_bytes(),
                CompressionMethod::Deflated,
            ),
        ];
        for (name, document) in &self.chapters {
            owned.push((
                format!("OEBPS/Text/{}", name),
                document.clone(),
                CompressionMethod::Deflated,
            ));
        }
        for (name, css) in &self.stylesheets {
            owned.push((
                format!("OEBPS/Styles/{}", name),
                css.as_bytes().to_vec(),
                CompressionMethod::Deflated,
            ));
        }
        owned.push((
            "OEBPS/Images/cover.png".to_string(),
            cover.to_vec(),
            CompressionMethod::Stored,
        ));

        let entries = owned
            .iter()
            .map(|(name, data, method)| (name.as_str(), data.as_slice(), *method))
            .collect::<Vec<_>>();
        write_archive(&path, &entries);
        path
    }
}
