//! Archive rewrite transactions
//!
//! An archive is never edited in place. The source is read into memory, a new
//! archive is built next to it as `<source>.temp`, and only when that archive
//! has been completely written is the source renamed to `<source>.original`
//! and the new archive renamed to the source's name. Any failure before the
//! first rename leaves the source untouched and removes the temporary file.
//!
//! ## Usage
//!
//! ```rust, no_run
//! # use std::collections::HashSet;
//! # fn main() -> Result<(), epub_mend::error::EpubError> {
//! use epub_mend::archive::rewrite_epub;
//!
//! rewrite_epub("book.epub", |inventory, editor| {
//!     let mut handled = HashSet::new();
//!     for path in inventory.content_documents() {
//!         let path = inventory.archive_path(path)?;
//!         let text = editor.read_to_string(&path)?;
//!         editor.write_file(&path, text.replace("teh", "the").as_bytes())?;
//!         handled.insert(path);
//!     }
//!     Ok(handled)
//! })?;
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashSet,
    ffi::OsString,
    fs::{self, File},
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::{error::EpubError, manifest::EpubInventory, utils::DecodeBytes};

/// The archive entry that must come first, uncompressed, in every EPUB
pub const MIMETYPE: &str = "mimetype";

/// Suffix identifying the package document among the archive entries
pub const PACKAGE_DOCUMENT_SUFFIX: &str = ".opf";

type SourceArchive = ZipArchive<Cursor<Vec<u8>>>;

/// Read and write access to an archive while a transaction is open
///
/// Reads always see the source archive as it was opened; writes go to the
/// archive being built. Every path written here is treated as handled, so it
/// is not copied again from the source.
pub struct ArchiveEditor<'a> {
    source: &'a mut SourceArchive,
    writer: &'a mut ZipWriter<File>,
    written: &'a mut HashSet<String>,
}

impl ArchiveEditor<'_> {
    /// Returns the entry names of the source archive in archive order
    pub fn entry_names(&self) -> Vec<String> {
        self.source.file_names_in_order()
    }

    /// Returns true if the source archive has an entry with this name
    pub fn contains(&self, path: &str) -> bool {
        self.source.index_for_name(path).is_some()
    }

    /// Reads the raw, decompressed bytes of a source entry
    pub fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>, EpubError> {
        get_file_in_zip_archive(self.source, path)
    }

    /// Reads and decodes a text entry of the source archive
    pub fn read_to_string(&mut self, path: &str) -> Result<String, EpubError> {
        self.read_bytes(path)?.decode()
    }

    /// Writes an entry into the new archive, deflate-compressed
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), EpubError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(path, options)?;
        self.writer.write_all(data)?;
        self.written.insert(path.to_string());

        debug!("Wrote modified entry \"{}\" ({} bytes).", path, data.len());
        Ok(())
    }
}

/// A parsed EPUB opened read-only
///
/// This is the first half of every EPUB transaction and is also usable on
/// its own when nothing is going to be written.
pub struct EpubSource {
    /// The manifest inventory of the package document
    pub inventory: EpubInventory,

    archive: SourceArchive,
}

impl EpubSource {
    /// Opens an EPUB, locates its package document and parses it
    ///
    /// # Return
    /// - `Ok(EpubSource)`: The opened archive and its inventory
    /// - `Err(EpubError)`: The archive cannot be read, has no package document,
    ///   or the package document is invalid
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let mut archive = load_archive(path.as_ref())?;

        let package_path = archive
            .file_names_in_order()
            .into_iter()
            .find(|name| name.ends_with(PACKAGE_DOCUMENT_SUFFIX))
            .ok_or(EpubError::PackageDocumentNotFound)?;

        let package = get_file_in_zip_archive(&mut archive, &package_path)?.decode()?;
        let inventory = EpubInventory::parse_package(&package_path, &package)?;

        Ok(Self { inventory, archive })
    }

    /// Reads and decodes a text entry by container path
    pub fn read_to_string(&mut self, path: &str) -> Result<String, EpubError> {
        get_file_in_zip_archive(&mut self.archive, path)?.decode()
    }
}

/// Rewrites an EPUB through `mutate`
///
/// The package document is parsed before `mutate` runs. The new archive
/// starts with the `mimetype` entry stored uncompressed, followed by whatever
/// `mutate` writes, followed by every other source entry copied verbatim.
///
/// # Parameters
/// - `source`: Path of the EPUB to rewrite
/// - `mutate`: Receives the inventory and an editor; returns the container paths
///   it has already written
///
/// # Return
/// - `Ok(())`: The new archive replaced the source; the old one is `<source>.original`
/// - `Err(EpubError)`: Nothing was renamed and the source is untouched
pub fn rewrite_epub<P, F>(source: P, mutate: F) -> Result<(), EpubError>
where
    P: AsRef<Path>,
    F: FnOnce(&EpubInventory, &mut ArchiveEditor<'_>) -> Result<HashSet<String>, EpubError>,
{
    let EpubSource {
        inventory,
        archive,
    } = EpubSource::open(source.as_ref())?;

    let mut transaction = Transaction::new(source.as_ref(), archive);
    let mimetype = transaction
        .read_mimetype()?
        .ok_or(EpubError::MissingMimetype)?;
    transaction.start(Some(mimetype.as_slice()))?;

    let handled = mutate(&inventory, &mut transaction.editor()?)?;
    transaction.commit(handled)
}

/// Rewrites a plain zip container (a comic book archive, say) through `mutate`
///
/// Same guarantees as [`rewrite_epub`], without a package document. A
/// `mimetype` entry is still moved to the front uncompressed when present.
pub fn rewrite_zip<P, F>(source: P, mutate: F) -> Result<(), EpubError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut ArchiveEditor<'_>) -> Result<HashSet<String>, EpubError>,
{
    let archive = load_archive(source.as_ref())?;

    let mut transaction = Transaction::new(source.as_ref(), archive);
    let mimetype = transaction.read_mimetype()?;
    transaction.start(mimetype.as_deref())?;

    let handled = mutate(&mut transaction.editor()?)?;
    transaction.commit(handled)
}

/// Returns `<path>.<suffix>`
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// One rebuild of an archive, from opening to the final rename
struct Transaction {
    source_path: PathBuf,
    temp_path: PathBuf,
    archive: SourceArchive,
    writer: Option<ZipWriter<File>>,
    written: HashSet<String>,
    committed: bool,
}

impl Transaction {
    fn new(source_path: &Path, archive: SourceArchive) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            temp_path: sibling_path(source_path, "temp"),
            archive,
            writer: None,
            written: HashSet::new(),
            committed: false,
        }
    }

    fn read_mimetype(&mut self) -> Result<Option<Vec<u8>>, EpubError> {
        match get_file_in_zip_archive(&mut self.archive, MIMETYPE) {
            Ok(data) => Ok(Some(data)),
            Err(EpubError::ResourceNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Creates the temporary archive and writes the mimetype entry first
    fn start(&mut self, mimetype: Option<&[u8]>) -> Result<(), EpubError> {
        let file = File::create(&self.temp_path)?;
        let writer = self.writer.insert(ZipWriter::new(file));

        if let Some(mimetype) = mimetype {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            writer.start_file(MIMETYPE, options)?;
            writer.write_all(mimetype)?;
        }

        Ok(())
    }

    fn editor(&mut self) -> Result<ArchiveEditor<'_>, EpubError> {
        let writer = self.writer.as_mut().ok_or_else(|| EpubError::IOError {
            source: std::io::Error::other("transaction was not started"),
        })?;

        Ok(ArchiveEditor {
            source: &mut self.archive,
            writer,
            written: &mut self.written,
        })
    }

    /// Copies the untouched entries, finishes the archive and swaps the files
    ///
    /// Only entries written through the editor replace source entries; a
    /// handled path that was never written is copied from the source.
    fn commit(mut self, handled: HashSet<String>) -> Result<(), EpubError> {
        for path in handled.difference(&self.written) {
            warn!(
                "\"{}\" was reported as handled but never written; copying it from the source.",
                path
            );
        }

        let mut writer = self.writer.take().ok_or_else(|| EpubError::IOError {
            source: std::io::Error::other("transaction was not started"),
        })?;

        for index in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(index)?;
            let name = entry.name().to_string();

            if name == MIMETYPE || self.written.contains(&name) {
                continue;
            }

            debug!("Copying \"{}\" verbatim.", name);
            writer.raw_copy_file(entry)?;
        }

        let file = writer.finish()?;
        file.sync_all()?;
        drop(file);

        let backup_path = sibling_path(&self.source_path, "original");
        if backup_path.exists() {
            warn!("Overwriting existing backup \"{}\".", backup_path.display());
        }

        // source to backup first, then temp to source
        fs::rename(&self.source_path, &backup_path)?;
        self.committed = true;
        fs::rename(&self.temp_path, &self.source_path)?;

        info!(
            "Rewrote \"{}\"; the previous archive is kept as \"{}\".",
            self.source_path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

impl Drop for Transaction {
    /// Remove the temporary archive when the transaction did not commit
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        drop(self.writer.take());
        if self.temp_path.exists() {
            if let Err(err) = fs::remove_file(&self.temp_path) {
                warn!(
                    "Unable to remove temporary archive \"{}\": {}",
                    self.temp_path.display(),
                    err
                );
            }
        }
    }
}

/// Reads the whole archive into memory
fn load_archive(path: &Path) -> Result<SourceArchive, EpubError> {
    let data = fs::read(path)?;
    ZipArchive::new(Cursor::new(data)).map_err(EpubError::from)
}

/// Extracts the contents of a specified file from a ZIP archive
///
/// ## Return
/// - `Ok(Vec<u8>)`: The decompressed bytes of the entry
/// - `Err(EpubError)`: `ResourceNotFound` if there is no such entry, or the read failed
fn get_file_in_zip_archive(
    archive: &mut SourceArchive,
    file_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let mut buffer = Vec::<u8>::new();
    match archive.by_name(file_name) {
        Ok(mut file) => {
            file.read_to_end(&mut buffer)?;
            Ok(buffer)
        }
        Err(ZipError::FileNotFound) => Err(EpubError::ResourceNotFound {
            resource: file_name.to_string(),
        }),
        Err(err) => Err(EpubError::from(err)),
    }
}

trait OrderedNames {
    fn file_names_in_order(&self) -> Vec<String>;
}

impl OrderedNames for SourceArchive {
    fn file_names_in_order(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|index| self.name_for_index(index).map(str::to_string))
            .collect()
    }
}
