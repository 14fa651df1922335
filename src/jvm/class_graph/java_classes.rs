use super::{BinaryName, ClassAccessFlags, ClassData, ClassGraph};

/// Add the commonly used classes and interfaces of `java.*` to the graph
///
/// These are enough to merge the types most methods juggle without needing the JDK itself on the
/// class path.
pub fn insert_java_classes(class_graph: &ClassGraph) {
    class_graph.add_class(ClassData {
        name: BinaryName::OBJECT,
        superclass: None,
        interfaces: vec![],
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    });

    insert_lang_classes(class_graph);
    insert_io_classes(class_graph);
    insert_util_classes(class_graph);
}

fn add_class(
    class_graph: &ClassGraph,
    name: BinaryName,
    superclass: BinaryName,
    interfaces: &[BinaryName],
) {
    class_graph.add_class(ClassData {
        name,
        superclass: Some(superclass),
        interfaces: interfaces.to_vec(),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    });
}

fn add_interface(class_graph: &ClassGraph, name: BinaryName, interfaces: &[BinaryName]) {
    class_graph.add_class(ClassData {
        name,
        superclass: Some(BinaryName::OBJECT),
        interfaces: interfaces.to_vec(),
        access_flags: ClassAccessFlags::PUBLIC
            | ClassAccessFlags::INTERFACE
            | ClassAccessFlags::ABSTRACT,
    });
}

/// Classes inside `java.lang.*`
fn insert_lang_classes(class_graph: &ClassGraph) {
    add_interface(class_graph, BinaryName::APPENDABLE, &[]);
    add_interface(class_graph, BinaryName::AUTOCLOSEABLE, &[]);
    add_interface(class_graph, BinaryName::CHARSEQUENCE, &[]);
    add_interface(class_graph, BinaryName::CLONEABLE, &[]);
    add_interface(class_graph, BinaryName::COMPARABLE, &[]);
    add_interface(class_graph, BinaryName::ITERABLE, &[]);
    add_interface(class_graph, BinaryName::SERIALIZABLE, &[]);

    let comparable_value = [BinaryName::SERIALIZABLE, BinaryName::COMPARABLE];
    add_class(
        class_graph,
        BinaryName::STRING,
        BinaryName::OBJECT,
        &[BinaryName::SERIALIZABLE, BinaryName::COMPARABLE, BinaryName::CHARSEQUENCE],
    );
    add_class(class_graph, BinaryName::CLASS, BinaryName::OBJECT, &[BinaryName::SERIALIZABLE]);
    add_class(class_graph, BinaryName::ENUM, BinaryName::OBJECT, &comparable_value);
    add_class(class_graph, BinaryName::BOOLEAN, BinaryName::OBJECT, &comparable_value);
    add_class(class_graph, BinaryName::CHARACTER, BinaryName::OBJECT, &comparable_value);
    add_class(class_graph, BinaryName::NUMBER, BinaryName::OBJECT, &[BinaryName::SERIALIZABLE]);
    add_class(class_graph, BinaryName::BYTE, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);
    add_class(class_graph, BinaryName::SHORT, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);
    add_class(class_graph, BinaryName::INTEGER, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);
    add_class(class_graph, BinaryName::LONG, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);
    add_class(class_graph, BinaryName::FLOAT, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);
    add_class(class_graph, BinaryName::DOUBLE, BinaryName::NUMBER, &[BinaryName::COMPARABLE]);

    add_class(
        class_graph,
        BinaryName::ABSTRACTSTRINGBUILDER,
        BinaryName::OBJECT,
        &[BinaryName::APPENDABLE, BinaryName::CHARSEQUENCE],
    );
    add_class(
        class_graph,
        BinaryName::STRINGBUILDER,
        BinaryName::ABSTRACTSTRINGBUILDER,
        &[BinaryName::SERIALIZABLE, BinaryName::CHARSEQUENCE],
    );

    add_class(class_graph, BinaryName::METHODHANDLE, BinaryName::OBJECT, &[]);
    add_class(class_graph, BinaryName::METHODTYPE, BinaryName::OBJECT, &[BinaryName::SERIALIZABLE]);

    add_class(class_graph, BinaryName::THROWABLE, BinaryName::OBJECT, &[BinaryName::SERIALIZABLE]);
    add_class(class_graph, BinaryName::ERROR, BinaryName::THROWABLE, &[]);
    add_class(class_graph, BinaryName::ASSERTIONERROR, BinaryName::ERROR, &[]);
    add_class(class_graph, BinaryName::LINKAGEERROR, BinaryName::ERROR, &[]);
    add_class(class_graph, BinaryName::EXCEPTION, BinaryName::THROWABLE, &[]);
    add_class(class_graph, BinaryName::RUNTIMEEXCEPTION, BinaryName::EXCEPTION, &[]);
    add_class(class_graph, BinaryName::ARITHMETICEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
    add_class(class_graph, BinaryName::CLASSCASTEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
    add_class(class_graph, BinaryName::ILLEGALARGUMENTEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
    add_class(
        class_graph,
        BinaryName::NUMBERFORMATEXCEPTION,
        BinaryName::ILLEGALARGUMENTEXCEPTION,
        &[],
    );
    add_class(class_graph, BinaryName::ILLEGALSTATEEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
    add_class(
        class_graph,
        BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
        BinaryName::RUNTIMEEXCEPTION,
        &[],
    );
    add_class(
        class_graph,
        BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION,
        BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
        &[],
    );
    add_class(class_graph, BinaryName::NULLPOINTEREXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
    add_class(
        class_graph,
        BinaryName::UNSUPPORTEDOPERATIONEXCEPTION,
        BinaryName::RUNTIMEEXCEPTION,
        &[],
    );
}

/// Classes inside `java.io.*`
fn insert_io_classes(class_graph: &ClassGraph) {
    add_interface(class_graph, BinaryName::CLOSEABLE, &[BinaryName::AUTOCLOSEABLE]);
    add_interface(class_graph, BinaryName::FLUSHABLE, &[]);

    add_class(class_graph, BinaryName::INPUTSTREAM, BinaryName::OBJECT, &[BinaryName::CLOSEABLE]);
    add_class(
        class_graph,
        BinaryName::OUTPUTSTREAM,
        BinaryName::OBJECT,
        &[BinaryName::CLOSEABLE, BinaryName::FLUSHABLE],
    );
    add_class(class_graph, BinaryName::IOEXCEPTION, BinaryName::EXCEPTION, &[]);
    add_class(class_graph, BinaryName::UNCHECKEDIOEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
}

/// Classes inside `java.util.*`
fn insert_util_classes(class_graph: &ClassGraph) {
    add_interface(class_graph, BinaryName::COLLECTION, &[BinaryName::ITERABLE]);
    add_interface(class_graph, BinaryName::LIST, &[BinaryName::COLLECTION]);
    add_interface(class_graph, BinaryName::MAP, &[]);
    add_interface(class_graph, BinaryName::ITERATOR, &[]);
    add_interface(class_graph, BinaryName::RANDOMACCESS, &[]);

    add_class(
        class_graph,
        BinaryName::ABSTRACTCOLLECTION,
        BinaryName::OBJECT,
        &[BinaryName::COLLECTION],
    );
    add_class(
        class_graph,
        BinaryName::ABSTRACTLIST,
        BinaryName::ABSTRACTCOLLECTION,
        &[BinaryName::LIST],
    );
    add_class(
        class_graph,
        BinaryName::ARRAYLIST,
        BinaryName::ABSTRACTLIST,
        &[
            BinaryName::LIST,
            BinaryName::RANDOMACCESS,
            BinaryName::CLONEABLE,
            BinaryName::SERIALIZABLE,
        ],
    );
    add_class(class_graph, BinaryName::ABSTRACTMAP, BinaryName::OBJECT, &[BinaryName::MAP]);
    add_class(
        class_graph,
        BinaryName::HASHMAP,
        BinaryName::ABSTRACTMAP,
        &[BinaryName::MAP, BinaryName::CLONEABLE, BinaryName::SERIALIZABLE],
    );
    add_class(class_graph, BinaryName::NOSUCHELEMENTEXCEPTION, BinaryName::RUNTIMEEXCEPTION, &[]);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassPath;

    #[test]
    fn builtin_hierarchy() {
        let graph = ClassGraph::new(ClassPath::empty());

        let string_builder = graph.lookup(&BinaryName::STRINGBUILDER).unwrap();
        assert_eq!(
            string_builder.superclass,
            Some(BinaryName::ABSTRACTSTRINGBUILDER)
        );
        assert!(graph.is_interface(&BinaryName::LIST));
        assert!(!graph.is_interface(&BinaryName::ARRAYLIST));
        assert_eq!(graph.lookup(&BinaryName::OBJECT).unwrap().superclass, None);
    }
}
