//! Class hierarchy knowledge
//!
//! Merging two object types during verification needs their least common superclass, so the
//! verifier needs to know a bit about every class that flows through a method. The graph starts
//! out with the common `java.*` types (see [`insert_java_classes`]) and the class being rewritten,
//! then loads anything else it is asked about lazily from a [`ClassPath`].
//!
//! A merge that needs the superclasses of a class the graph cannot find fails with
//! [`UnknownClass`]: guessing `java/lang/Object` there produces frames the JVM rejects.

use super::class_file::ClassFile;
use super::{BinaryName, ClassAccessFlags, Error, FieldType, RefType};
use elsa::map::FrozenMap;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashSet;

mod class_path;
mod java_classes;

pub use class_path::*;
pub use java_classes::*;

/// Header information about a class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassData {
    pub name: BinaryName,

    /// Only `java/lang/Object` has no superclass (interfaces have `java/lang/Object`)
    pub superclass: Option<BinaryName>,

    /// Directly implemented interfaces (or extended interfaces, for an interface)
    pub interfaces: Vec<BinaryName>,

    pub access_flags: ClassAccessFlags,
}

impl ClassData {
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Extract the header of a parsed class file
    pub fn from_class_file(class_file: &ClassFile) -> Result<ClassData, Error> {
        Ok(ClassData {
            name: class_file.this_class_name()?,
            superclass: class_file.super_class_name()?,
            interfaces: class_file.interface_names()?,
            access_flags: class_file.access_flags,
        })
    }
}

/// Class that is neither built in nor on the class path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClass(pub BinaryName);

/// Tracks the relationships between classes/interfaces
///
/// The graph is append-only, which is what lets [`ClassGraph::lookup`] load classes on demand
/// through a shared reference while earlier lookups are still borrowed.
pub struct ClassGraph {
    classes: FrozenMap<BinaryName, Box<ClassData>>,

    /// Names already searched for on the class path and not found
    missing: RefCell<HashSet<BinaryName>>,

    class_path: ClassPath,
}

impl ClassGraph {
    /// New graph containing the standard `java.*` types
    pub fn new(class_path: ClassPath) -> ClassGraph {
        let graph = ClassGraph {
            classes: FrozenMap::new(),
            missing: RefCell::new(HashSet::new()),
            class_path,
        };
        insert_java_classes(&graph);
        graph
    }

    /// Add a class to the graph, replacing nothing if it was already known
    pub fn add_class(&self, data: ClassData) -> &ClassData {
        match self.classes.get(&data.name) {
            Some(existing) => existing,
            None => self.classes.insert(data.name.clone(), Box::new(data)),
        }
    }

    /// Find a class, loading it from the class path if needed
    pub fn lookup(&self, name: &BinaryName) -> Option<&ClassData> {
        if let Some(data) = self.classes.get(name) {
            return Some(data);
        }
        if self.missing.borrow().contains(name) {
            return None;
        }

        match self.class_path.load(name) {
            Ok(Some(data)) => {
                debug!("loaded {} from the class path", name);
                Some(self.add_class(data))
            }
            Ok(None) => {
                debug!("{} is not on the class path", name);
                self.missing.borrow_mut().insert(name.clone());
                None
            }
            Err(err) => {
                warn!("failed to load {}: {}", name, err);
                self.missing.borrow_mut().insert(name.clone());
                None
            }
        }
    }

    /// Is this a known interface?
    pub fn is_interface(&self, name: &BinaryName) -> bool {
        self.lookup(name)
            .map(ClassData::is_interface)
            .unwrap_or(false)
    }

    /// Find a class, failing if it is nowhere to be found
    pub fn require(&self, name: &BinaryName) -> Result<&ClassData, UnknownClass> {
        self.lookup(name)
            .ok_or_else(|| UnknownClass(name.clone()))
    }

    /// Chain of superclasses, starting with the class itself
    ///
    /// The chain stops early if the hierarchy is cyclic, which only a broken class path can
    /// produce.
    fn superclass_chain(&self, name: &BinaryName) -> Result<Vec<BinaryName>, UnknownClass> {
        let mut chain = vec![name.clone()];
        let mut seen: HashSet<BinaryName> = HashSet::new();
        seen.insert(name.clone());

        let mut next = self.require(name)?.superclass.clone();
        while let Some(superclass) = next {
            if !seen.insert(superclass.clone()) {
                break;
            }
            next = self.require(&superclass)?.superclass.clone();
            chain.push(superclass);
        }

        Ok(chain)
    }

    /// Least common superclass of two classes
    ///
    /// Interfaces merge to `java/lang/Object`, the same as the JVM's type checker treats them.
    /// Every class up both superclass chains must be known.
    pub fn common_super_class(
        &self,
        class1: &BinaryName,
        class2: &BinaryName,
    ) -> Result<BinaryName, UnknownClass> {
        if class1 == class2 {
            return Ok(class1.clone());
        }
        let is_interface1 = self.require(class1)?.is_interface();
        let is_interface2 = self.require(class2)?.is_interface();
        if is_interface1 || is_interface2 {
            return Ok(BinaryName::OBJECT);
        }

        let chain1 = self.superclass_chain(class1)?;
        for superclass in self.superclass_chain(class2)? {
            if chain1.contains(&superclass) {
                return Ok(superclass);
            }
        }
        Ok(BinaryName::OBJECT)
    }

    /// Query if one type is assignable to another
    ///
    /// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)`
    /// in the JVM verifier specification.
    ///
    /// Note: if some of the types queried can't be found, this may return false negatives.
    pub fn is_assignable(
        &self,
        sub_type: &RefType<BinaryName>,
        super_type: &RefType<BinaryName>,
    ) -> bool {
        match (sub_type, super_type) {
            // Object-to-object assignability holds if there is a path through super type edges
            (RefType::Object(class1), RefType::Object(class2)) => {
                self.is_object_type_assignable(class1, class2)
            }

            // Special superclass and interfaces of all arrays
            (_, RefType::Object(class)) => Self::is_array_type_assignable(class),

            (_, _) if sub_type.is_array() && super_type.is_array() => {
                match (sub_type.component_type(), super_type.component_type()) {
                    // Cursed (unsound) covariance of arrays
                    (Some(FieldType::Ref(elem1)), Some(FieldType::Ref(elem2))) => {
                        self.is_assignable(&elem1, &elem2)
                    }

                    // Primitive arrays must match in type
                    (elem1, elem2) => elem1 == elem2,
                }
            }

            _ => false,
        }
    }

    /// Object to object assignability
    ///
    /// This does a search up the superclasses and superinterfaces looking for the super type.
    fn is_object_type_assignable(&self, sub_type: &BinaryName, super_type: &BinaryName) -> bool {
        if sub_type == super_type || super_type == &BinaryName::OBJECT {
            return true;
        }

        let mut supertypes_to_visit: Vec<BinaryName> = vec![sub_type.clone()];
        let mut dont_revisit: HashSet<BinaryName> = HashSet::new();
        dont_revisit.insert(sub_type.clone());

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class = !self.is_interface(super_type);

        while let Some(class_name) = supertypes_to_visit.pop() {
            if &class_name == super_type {
                return true;
            }
            let class_data = match self.lookup(&class_name) {
                Some(class_data) => class_data,
                None => continue,
            };

            // Enqueue next types to visit
            if let Some(superclass) = &class_data.superclass {
                if dont_revisit.insert(superclass.clone()) {
                    supertypes_to_visit.push(superclass.clone());
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    if dont_revisit.insert(interface.clone()) {
                        supertypes_to_visit.push(interface.clone());
                    }
                }
            }
        }

        false
    }

    /// Check if arrays can be assigned to a super type
    ///
    /// This bakes in knowledge of the small, finite set of super types arrays have.
    fn is_array_type_assignable(super_type: &BinaryName) -> bool {
        super_type == &BinaryName::OBJECT
            || super_type == &BinaryName::CLONEABLE
            || super_type == &BinaryName::SERIALIZABLE
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    fn name(name: &str) -> BinaryName {
        BinaryName::from_str(name).unwrap()
    }

    fn object(class: &str) -> RefType<BinaryName> {
        RefType::from_class_name(class).unwrap()
    }

    #[test]
    fn common_super_classes() {
        let graph = ClassGraph::new(ClassPath::empty());

        assert_eq!(
            graph.common_super_class(&BinaryName::INTEGER, &BinaryName::DOUBLE),
            Ok(BinaryName::NUMBER)
        );
        assert_eq!(
            graph.common_super_class(&BinaryName::IOEXCEPTION, &BinaryName::NULLPOINTEREXCEPTION),
            Ok(BinaryName::EXCEPTION)
        );
        assert_eq!(
            graph.common_super_class(&BinaryName::ARRAYLIST, &BinaryName::STRING),
            Ok(BinaryName::OBJECT)
        );
        assert_eq!(
            graph.common_super_class(&BinaryName::LIST, &BinaryName::ARRAYLIST),
            Ok(BinaryName::OBJECT)
        );
    }

    #[test]
    fn unknown_classes_cannot_be_merged() {
        let graph = ClassGraph::new(ClassPath::empty());
        assert_eq!(
            graph.common_super_class(&name("com/acme/Missing"), &BinaryName::INTEGER),
            Err(UnknownClass(name("com/acme/Missing")))
        );

        // Known class with a missing superclass
        graph.add_class(ClassData {
            name: name("com/acme/Orphan"),
            superclass: Some(name("com/acme/Parent")),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
        });
        assert_eq!(
            graph.common_super_class(&name("com/acme/Orphan"), &BinaryName::STRING),
            Err(UnknownClass(name("com/acme/Parent")))
        );

        // Equal classes need no lookup
        assert_eq!(
            graph.common_super_class(&name("com/acme/Missing"), &name("com/acme/Missing")),
            Ok(name("com/acme/Missing"))
        );
    }

    #[test]
    fn added_classes_join_the_hierarchy() {
        let graph = ClassGraph::new(ClassPath::empty());
        graph.add_class(ClassData {
            name: name("com/acme/Base"),
            superclass: Some(BinaryName::OBJECT),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
        });
        graph.add_class(ClassData {
            name: name("com/acme/Left"),
            superclass: Some(name("com/acme/Base")),
            interfaces: vec![BinaryName::RANDOMACCESS],
            access_flags: ClassAccessFlags::PUBLIC,
        });
        graph.add_class(ClassData {
            name: name("com/acme/Right"),
            superclass: Some(name("com/acme/Base")),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
        });

        assert_eq!(
            graph.common_super_class(&name("com/acme/Left"), &name("com/acme/Right")),
            Ok(name("com/acme/Base"))
        );
        assert!(graph.is_assignable(&object("com/acme/Left"), &object("java/util/RandomAccess")));
        assert!(!graph.is_assignable(&object("com/acme/Right"), &object("com/acme/Left")));
    }

    #[test]
    fn cyclic_hierarchies_terminate() {
        let graph = ClassGraph::new(ClassPath::empty());
        graph.add_class(ClassData {
            name: name("A"),
            superclass: Some(name("B")),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
        });
        graph.add_class(ClassData {
            name: name("B"),
            superclass: Some(name("A")),
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
        });

        assert_eq!(
            graph.common_super_class(&name("A"), &BinaryName::STRING),
            Ok(BinaryName::OBJECT)
        );
        assert!(!graph.is_assignable(&object("A"), &object("java/lang/String")));
    }

    #[test]
    fn assignability() {
        let graph = ClassGraph::new(ClassPath::empty());

        assert!(graph.is_assignable(&object("java/lang/Integer"), &object("java/lang/Number")));
        assert!(graph.is_assignable(
            &object("java/lang/String"),
            &object("java/lang/CharSequence")
        ));
        assert!(graph.is_assignable(
            &object("java/util/ArrayList"),
            &object("java/lang/Iterable")
        ));
        assert!(!graph.is_assignable(&object("java/lang/Number"), &object("java/lang/Integer")));

        assert!(graph.is_assignable(&object("[I"), &object("java/lang/Cloneable")));
        assert!(graph.is_assignable(
            &object("[Ljava/lang/Integer;"),
            &object("[Ljava/lang/Number;")
        ));
        assert!(!graph.is_assignable(&object("[I"), &object("[J")));
        assert!(!graph.is_assignable(&object("[I"), &object("java/lang/Number")));
    }
}
