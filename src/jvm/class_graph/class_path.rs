use super::ClassData;
use crate::jvm::class_file::ClassFile;
use crate::jvm::{BinaryName, Error};
use log::{debug, warn};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

/// Where to look for a class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPathEntry {
    /// Root of a directory tree (`com/acme/Foo` lives at `<root>/com/acme/Foo.class`)
    Directory(PathBuf),

    /// Jar (or any zip archive) with `com/acme/Foo.class` entries
    Jar(PathBuf),

    /// JDK module with `classes/com/acme/Foo.class` entries
    Jmod(PathBuf),
}

/// Ordered list of places to search for classes
///
/// The first entry containing a class wins. Archives are opened once per lookup, so nothing is
/// held open between lookups.
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    entries: Vec<ClassPathEntry>,
}

#[derive(Debug)]
pub enum ClassPathError {
    /// Class path entry that is neither a directory nor a file
    MissingEntry(PathBuf),

    Io(PathBuf, std::io::Error),
    Zip(PathBuf, ZipError),

    /// Class file on the class path could not be decoded
    ClassFormat(PathBuf, Error),
}

impl ClassPath {
    /// Class path with no entries (only the built-in classes will be known)
    pub fn empty() -> ClassPath {
        ClassPath { entries: vec![] }
    }

    /// Class path from a list of directories and jars
    pub fn new<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Result<ClassPath, ClassPathError> {
        let mut class_path = ClassPath::empty();
        for path in paths {
            class_path.push(path)?;
        }
        Ok(class_path)
    }

    /// Add an entry at the end of the class path
    ///
    /// Files ending in `.jmod` are read as JDK modules, and any other file as a jar.
    pub fn push(&mut self, path: impl AsRef<Path>) -> Result<(), ClassPathError> {
        let path = path.as_ref();
        let entry = if path.is_dir() {
            ClassPathEntry::Directory(path.to_owned())
        } else if path.is_file() && path.extension().map_or(false, |ext| ext == "jmod") {
            ClassPathEntry::Jmod(path.to_owned())
        } else if path.is_file() {
            ClassPathEntry::Jar(path.to_owned())
        } else {
            return Err(ClassPathError::MissingEntry(path.to_owned()));
        };
        debug!("class path entry {:?}", entry);
        self.entries.push(entry);
        Ok(())
    }

    /// Add the standard library of a JDK installation at the end of the class path
    ///
    /// JDK 9 and later ship their modules as `jmods/*.jmod` (`java.base` is searched first), and
    /// older JDKs have a single `rt.jar`. Returns how many entries were added.
    pub fn push_jdk(&mut self, java_home: impl AsRef<Path>) -> Result<usize, ClassPathError> {
        let java_home = java_home.as_ref();
        let jmods_dir = java_home.join("jmods");

        let mut found = vec![];
        if jmods_dir.is_dir() {
            let read_dir = std::fs::read_dir(&jmods_dir)
                .map_err(|err| ClassPathError::Io(jmods_dir.clone(), err))?;
            for dir_entry in read_dir {
                let path = dir_entry
                    .map_err(|err| ClassPathError::Io(jmods_dir.clone(), err))?
                    .path();
                if path.extension().map_or(false, |ext| ext == "jmod") {
                    found.push(path);
                }
            }
            found.sort_by_key(|path| (!path.ends_with("java.base.jmod"), path.clone()));
        } else {
            for rt_jar in [java_home.join("lib/rt.jar"), java_home.join("jre/lib/rt.jar")] {
                if rt_jar.is_file() {
                    found.push(rt_jar);
                    break;
                }
            }
        }

        for path in &found {
            self.push(path)?;
        }
        Ok(found.len())
    }

    pub fn entries(&self) -> &[ClassPathEntry] {
        &self.entries
    }

    /// Search the class path for a class and extract its header
    ///
    /// A class file whose name does not match the name it was found under is skipped.
    pub fn load(&self, name: &BinaryName) -> Result<Option<ClassData>, ClassPathError> {
        for entry in &self.entries {
            let (location, bytes) = match entry {
                ClassPathEntry::Directory(root) => {
                    let path = root.join(name.class_file_path());
                    match read_class_file(&path)? {
                        Some(bytes) => (path, bytes),
                        None => continue,
                    }
                }
                ClassPathEntry::Jar(jar) => {
                    let file = File::open(jar).map_err(|err| ClassPathError::Io(jar.clone(), err))?;
                    match read_zip_entry(jar, file, &name.class_file_entry())? {
                        Some(bytes) => (jar.clone(), bytes),
                        None => continue,
                    }
                }
                ClassPathEntry::Jmod(jmod) => {
                    let reader = JmodReader::open(jmod)
                        .map_err(|err| ClassPathError::Io(jmod.clone(), err))?;
                    let entry_name = format!("classes/{}", name.class_file_entry());
                    match read_zip_entry(jmod, reader, &entry_name)? {
                        Some(bytes) => (jmod.clone(), bytes),
                        None => continue,
                    }
                }
            };

            let class_data = ClassFile::parse(&bytes)
                .map_err(Error::from)
                .and_then(|class_file| ClassData::from_class_file(&class_file))
                .map_err(|err| ClassPathError::ClassFormat(location.clone(), err))?;
            if &class_data.name != name {
                warn!(
                    "{} holds {} instead of {}",
                    location.display(),
                    class_data.name,
                    name
                );
                continue;
            }
            return Ok(Some(class_data));
        }

        Ok(None)
    }
}

fn read_class_file(path: &Path) -> Result<Option<Vec<u8>>, ClassPathError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ClassPathError::Io(path.to_owned(), err)),
    }
}

fn read_zip_entry<R: Read + Seek>(
    archive_path: &Path,
    reader: R,
    entry_name: &str,
) -> Result<Option<Vec<u8>>, ClassPathError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|err| ClassPathError::Zip(archive_path.to_owned(), err))?;
    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(ClassPathError::Zip(archive_path.to_owned(), err)),
    };

    let mut bytes = vec![];
    entry
        .read_to_end(&mut bytes)
        .map_err(|err| ClassPathError::Io(archive_path.to_owned(), err))?;
    Ok(Some(bytes))
}

/// Zip archive stored in a `.jmod` file, after its 4 byte `JM` header
///
/// Offsets inside the archive are relative to the end of the header.
struct JmodReader {
    file: File,
}

impl JmodReader {
    const HEADER_LEN: u64 = 4;

    fn open(path: &Path) -> std::io::Result<JmodReader> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 4];
        file.read_exact(&mut header)?;
        if &header[..2] != b"JM" {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "missing JM header",
            ));
        }
        Ok(JmodReader { file })
    }
}

impl Read for JmodReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for JmodReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let pos = match pos {
            SeekFrom::Start(offset) => SeekFrom::Start(offset + JmodReader::HEADER_LEN),
            relative => relative,
        };
        let absolute = self.file.seek(pos)?;
        absolute.checked_sub(JmodReader::HEADER_LEN).ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidInput, "seek into the jmod header")
        })
    }
}

/// Guess where the running JDK is installed
///
/// `JAVA_HOME` wins if it is set. Otherwise the `java` found on `PATH` is followed through any
/// symlinks to `<home>/bin/java`.
pub fn find_java_home() -> Option<PathBuf> {
    if let Some(java_home) = std::env::var_os("JAVA_HOME") {
        let java_home = PathBuf::from(java_home);
        if java_home.is_dir() {
            return Some(java_home);
        }
        warn!("JAVA_HOME ({}) is not a directory", java_home.display());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("java"))
        .find(|java| java.is_file())
        .and_then(|java| java.canonicalize().ok())
        .and_then(|java| java.parent()?.parent().map(Path::to_owned))
}

impl Display for ClassPathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassPathError::MissingEntry(path) => {
                write!(f, "class path entry {} does not exist", path.display())
            }
            ClassPathError::Io(path, err) => write!(f, "{}: {}", path.display(), err),
            ClassPathError::Zip(path, err) => write!(f, "{}: {}", path.display(), err),
            ClassPathError::ClassFormat(path, err) => write!(f, "{}: {}", path.display(), err),
        }
    }
}

impl std::error::Error for ClassPathError {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn missing_entries_are_rejected() {
        let missing = std::env::temp_dir().join(format!(
            "stackmap-rebuild-missing-{}",
            std::process::id()
        ));
        assert!(matches!(
            ClassPath::new([&missing]),
            Err(ClassPathError::MissingEntry(path)) if path == missing
        ));
    }

    #[test]
    fn jdk_layouts() {
        let root = std::env::temp_dir().join(format!(
            "stackmap-rebuild-jdk-layouts-{}",
            std::process::id()
        ));
        let modern = root.join("jdk17");
        std::fs::create_dir_all(modern.join("jmods")).unwrap();
        for module in ["java.sql.jmod", "java.base.jmod", "java.desktop.jmod"] {
            std::fs::write(modern.join("jmods").join(module), b"JM\x01\x00").unwrap();
        }
        std::fs::write(modern.join("jmods").join("README"), b"").unwrap();

        let mut class_path = ClassPath::empty();
        assert_eq!(class_path.push_jdk(&modern).unwrap(), 3);
        assert_eq!(
            class_path.entries(),
            &[
                ClassPathEntry::Jmod(modern.join("jmods/java.base.jmod")),
                ClassPathEntry::Jmod(modern.join("jmods/java.desktop.jmod")),
                ClassPathEntry::Jmod(modern.join("jmods/java.sql.jmod")),
            ]
        );

        let legacy = root.join("jdk8");
        std::fs::create_dir_all(legacy.join("jre/lib")).unwrap();
        std::fs::write(legacy.join("jre/lib/rt.jar"), b"").unwrap();
        let mut class_path = ClassPath::empty();
        assert_eq!(class_path.push_jdk(&legacy).unwrap(), 1);
        assert_eq!(
            class_path.entries(),
            &[ClassPathEntry::Jar(legacy.join("jre/lib/rt.jar"))]
        );

        let mut class_path = ClassPath::empty();
        assert_eq!(class_path.push_jdk(root.join("nowhere")).unwrap(), 0);
        assert!(class_path.entries().is_empty());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn jmod_header_is_skipped() {
        let path = std::env::temp_dir().join(format!(
            "stackmap-rebuild-header-{}.jmod",
            std::process::id()
        ));
        std::fs::write(&path, b"JM\x01\x00zip bytes").unwrap();

        let mut reader = JmodReader::open(&path).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "zip bytes");
        assert_eq!(reader.seek(SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(reader.seek(SeekFrom::End(-5)).unwrap(), 4);
        assert!(reader.seek(SeekFrom::Current(-6)).is_err());

        std::fs::write(&path, b"PK\x03\x04").unwrap();
        assert!(JmodReader::open(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_directory_has_no_classes() {
        let class_path = ClassPath::new([std::env::temp_dir()]).unwrap();
        assert_eq!(
            class_path.entries(),
            &[ClassPathEntry::Directory(std::env::temp_dir())]
        );
        let name = BinaryName::from_str("com/acme/does/not/Exist").unwrap();
        assert!(class_path.load(&name).unwrap().is_none());
    }
}
