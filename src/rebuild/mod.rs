//! Rebuild the stack map of one method and save the class
//!
//! Everything in the class other than the selected method's `Code` attribute (and the constants
//! the new frames need) is written back exactly as it was read.

mod errors;
mod settings;

pub use errors::*;
pub use settings::*;

use crate::jvm;
use crate::jvm::class_file::ClassFile;
use crate::jvm::class_graph::{ClassData, ClassGraph, ClassPath};
use crate::jvm::verifier::{rebuild_stack_map, MethodSignature};
use crate::jvm::{BinaryName, MethodDescriptor, Name, ParseDescriptor};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Run the whole pipeline, returning the path the rewritten class was saved to
pub fn run(settings: &Settings) -> Result<PathBuf, Error> {
    println!(
        "args are :  classfile: {}, method: {}",
        settings.input.display(),
        settings.method_name
    );
    println!("output directory: {}", settings.output_directory.display());

    let bytes = {
        let mut input = File::open(&settings.input)?;
        let mut bytes = vec![];
        input.read_to_end(&mut bytes)?;
        bytes
    };
    let mut class_file = ClassFile::parse(&bytes)?;
    let class_name = class_file.this_class_name()?;
    debug!("read {} ({} bytes)", class_name, bytes.len());
    if !class_file.version.uses_stack_maps() {
        warn!(
            "{} has version {}.{}, which predates stack map tables",
            class_name, class_file.version.major_version, class_file.version.minor_version
        );
    }

    let method_index = find_method(
        &class_file,
        &settings.method_name,
        settings.method_descriptor.as_deref(),
    )?;
    let method = &class_file.methods[method_index];
    let descriptor = method.descriptor(&class_file.constants)?;
    let mut code = match method.code(&class_file.constants)? {
        Some(code) => code,
        None => {
            return Err(Error::MethodHasNoCode {
                name: settings.method_name.clone(),
                descriptor,
            })
        }
    };
    let signature = MethodSignature {
        class: class_name.clone(),
        name: settings.method_name.clone(),
        descriptor: MethodDescriptor::parse(&descriptor)
            .map_err(|_| jvm::Error::BadDescriptor(descriptor.clone()))?,
        is_static: method.is_static(),
    };

    let class_graph = ClassGraph::new(class_path(settings, &class_name)?);
    class_graph.add_class(ClassData::from_class_file(&class_file)?);

    let summary = rebuild_stack_map(
        &signature,
        &mut code,
        &mut class_file.constants,
        &class_graph,
    )?;
    info!(
        "{}{}: {} frames, {} unreachable blocks, max stack {}",
        signature.name, descriptor, summary.frames, summary.dead_blocks, summary.max_stack
    );

    let code_attribute = class_file.constants.get_attribute(&code)?;
    class_file.methods[method_index].set_code(&class_file.constants, code_attribute);

    let output_path = settings
        .output_directory
        .join(class_name.class_file_path());
    class_file.save_to_path(&output_path, true)?;
    info!("wrote {}", output_path.display());

    Ok(output_path)
}

/// Index of the method to rewrite
///
/// Without a descriptor, the first method with the right name wins (with a warning if the name is
/// overloaded).
fn find_method(
    class_file: &ClassFile,
    name: &str,
    descriptor: Option<&str>,
) -> Result<usize, Error> {
    let mut candidates = vec![];
    for (idx, method) in class_file.methods.iter().enumerate() {
        if method.name(&class_file.constants)? == name {
            candidates.push((idx, method.descriptor(&class_file.constants)?));
        }
    }

    let found = match descriptor {
        Some(descriptor) => candidates
            .iter()
            .find(|(_, candidate)| candidate == descriptor)
            .map(|(idx, _)| *idx),
        None => {
            if candidates.len() > 1 {
                let descriptors: Vec<&str> =
                    candidates.iter().map(|(_, desc)| desc.as_str()).collect();
                warn!(
                    "{} is overloaded ({}), using the first one",
                    name,
                    descriptors.join(", ")
                );
            }
            candidates.first().map(|(idx, _)| *idx)
        }
    };

    found.ok_or_else(|| Error::MethodNotFound {
        name: name.to_owned(),
        descriptor: descriptor.map(str::to_owned),
    })
}

/// JDK classes, then explicit class path entries, then the root the input class was found under
fn class_path(settings: &Settings, class_name: &BinaryName) -> Result<ClassPath, Error> {
    let mut class_path = ClassPath::empty();
    match &settings.java_home {
        Some(java_home) => {
            let added = class_path.push_jdk(java_home)?;
            if added == 0 {
                warn!(
                    "no jmods or rt.jar under {}, only common java classes are known",
                    java_home.display()
                );
            } else {
                debug!("{} JDK class path entries from {}", added, java_home.display());
            }
        }
        None => warn!("no JDK found, only common java classes are known"),
    }
    for entry in &settings.class_path {
        class_path.push(entry)?;
    }

    match implied_root(&settings.input, class_name) {
        Some(root) if root.is_dir() => class_path.push(root)?,
        Some(_) => (),
        None => debug!(
            "{} is not laid out under a {} class path root",
            settings.input.display(),
            class_name
        ),
    }
    Ok(class_path)
}

/// Class path root implied by where the class file is (`/src/com/acme/Foo.class` holding
/// `com/acme/Foo` implies `/src`)
fn implied_root(input: &Path, class_name: &BinaryName) -> Option<PathBuf> {
    let mut root = input.parent()?;
    for package in class_name.as_str().rsplit('/').skip(1) {
        if root.file_name()? != package {
            return None;
        }
        root = root.parent()?;
    }

    if root.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(root.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn implied_roots() {
        let foo = BinaryName::from_str("com/acme/Foo").unwrap();
        assert_eq!(
            implied_root(Path::new("/src/com/acme/Foo.class"), &foo),
            Some(PathBuf::from("/src"))
        );
        assert_eq!(
            implied_root(Path::new("com/acme/Foo.class"), &foo),
            Some(PathBuf::from("."))
        );
        assert_eq!(implied_root(Path::new("/src/org/acme/Foo.class"), &foo), None);

        let bar = BinaryName::from_str("Bar").unwrap();
        assert_eq!(
            implied_root(Path::new("/out/Bar.class"), &bar),
            Some(PathBuf::from("/out"))
        );
        assert_eq!(
            implied_root(Path::new("Bar.class"), &bar),
            Some(PathBuf::from("."))
        );
    }
}
