#![allow(dead_code)]

use stackmap_rebuild::jvm::class_file::{
    Attribute, BytecodeArray, ClassConstantIndex, ClassFile, Code, ConstantIndex, ConstantsPool,
    ExceptionHandler, Method, MethodRefConstantIndex, StackMapFrame, StackMapTable, Version,
};
use stackmap_rebuild::jvm::{ClassAccessFlags, MethodAccessFlags};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use zip::write::{FileOptions, ZipWriter};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh, empty directory under the system temporary directory
pub fn temp_dir(label: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "stackmap-rebuild-{}-{}-{}-{}",
        label,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos(),
        n
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Assemble a class file one method at a time
pub struct ClassBuilder {
    pub constants: ConstantsPool,
    class_file_name: String,
    access_flags: ClassAccessFlags,
    methods: Vec<Method>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> ClassBuilder {
        ClassBuilder {
            constants: ConstantsPool::new(),
            class_file_name: name.to_owned(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            methods: vec![],
        }
    }

    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<Code>,
    ) {
        let name_index = self.constants.get_utf8(name).unwrap();
        let descriptor_index = self.constants.get_utf8(descriptor).unwrap();
        let attributes = match code {
            Some(code) => vec![self.constants.get_attribute(&code).unwrap()],
            None => vec![],
        };
        self.methods.push(Method {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }

    pub fn finish(mut self, superclass: &str) -> ClassFile {
        let this_class = self.constants.get_class(&self.class_file_name).unwrap();
        let super_class = self.constants.get_class(superclass).unwrap();
        ClassFile {
            version: Version::JAVA8,
            constants: self.constants,
            access_flags: self.access_flags,
            this_class,
            super_class: Some(super_class),
            interfaces: vec![],
            fields: vec![],
            methods: self.methods,
            attributes: vec![],
        }
    }
}

pub fn code(max_stack: u16, max_locals: u16, bytes: &[u8]) -> Code {
    Code {
        max_stack,
        max_locals,
        code_array: BytecodeArray(bytes.to_vec()),
        exception_table: vec![],
        attributes: vec![],
    }
}

/// Public static method
pub fn public_static() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
}

/// `com/acme/Sample`, with a constructor, overloaded `max`, `choose`, and a native method
///
/// `max(II)I` carries a stale stack map table and a `LineNumberTable`.
pub fn sample_class() -> ClassFile {
    let mut class = ClassBuilder::new("com/acme/Sample");

    let object_init = class
        .constants
        .get_method_ref("java/lang/Object", "<init>", "()V", false)
        .unwrap();
    let [init_hi, init_lo] = ((object_init.0).0).to_be_bytes();
    let init = code(1, 1, &[0x2a, 0xb7, init_hi, init_lo, 0xb1]);
    class.add_method(MethodAccessFlags::PUBLIC, "<init>", "()V", Some(init));

    // static int max(int a, int b) { return a > b ? a : b; }
    let mut max_ints = code(
        2,
        2,
        &[
            0x1a, // 0: iload_0
            0x1b, // 1: iload_1
            0xa4, 0x00, 0x07, // 2: if_icmple 9
            0x1a, // 5: iload_0
            0xa7, 0x00, 0x04, // 6: goto 10
            0x1b, // 9: iload_1
            0xac, // 10: ireturn
        ],
    );
    let stale = StackMapTable(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 3 }]);
    max_ints
        .attributes
        .push(class.constants.get_attribute(&stale).unwrap());
    max_ints.attributes.push(Attribute {
        name_index: class.constants.get_utf8("LineNumberTable").unwrap(),
        info: vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07],
    });
    class.add_method(public_static(), "max", "(II)I", Some(max_ints));

    // static long max(long a, long b) { return a > b ? a : b; }
    let max_longs = code(
        4,
        4,
        &[
            0x1e, // 0: lload_0
            0x20, // 1: lload_2
            0x94, // 2: lcmp
            0x9e, 0x00, 0x07, // 3: ifle 10
            0x1e, // 6: lload_0
            0xa7, 0x00, 0x04, // 7: goto 11
            0x20, // 10: lload_2
            0xad, // 11: lreturn
        ],
    );
    class.add_method(public_static(), "max", "(JJ)J", Some(max_longs));

    // static Base choose(boolean left, Left l, Right r) { return left ? l : r; }
    let choose = code(
        1,
        3,
        &[
            0x1a, // 0: iload_0
            0x99, 0x00, 0x07, // 1: ifeq 8
            0x2b, // 4: aload_1
            0xa7, 0x00, 0x04, // 5: goto 9
            0x2c, // 8: aload_2
            0xb0, // 9: areturn
        ],
    );
    class.add_method(
        public_static(),
        "choose",
        "(ZLcom/acme/Left;Lcom/acme/Right;)Lcom/acme/Base;",
        Some(choose),
    );

    class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::NATIVE,
        "nativeThing",
        "()V",
        None,
    );

    class.finish("java/lang/Object")
}

/// `com/acme/Base` with subclasses `com/acme/Left` and `com/acme/Right`
pub fn hierarchy_classes() -> Vec<(&'static str, ClassFile)> {
    vec![
        ("com/acme/Base", ClassBuilder::new("com/acme/Base").finish("java/lang/Object")),
        ("com/acme/Left", ClassBuilder::new("com/acme/Left").finish("com/acme/Base")),
        ("com/acme/Right", ClassBuilder::new("com/acme/Right").finish("com/acme/Base")),
    ]
}

/// Save a class under a class path root, returning the path of the class file
pub fn write_class(root: &Path, name: &str, class: &ClassFile) -> PathBuf {
    let path = root.join(format!("{}.class", name));
    class.save_to_path(&path, true).unwrap();
    path
}

/// Pack classes into a jar
pub fn write_jar(path: &Path, classes: &[(&str, ClassFile)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, class) in classes {
        zip.start_file(format!("{}.class", name), FileOptions::default())
            .unwrap();
        zip.write_all(&class.to_bytes().unwrap()).unwrap();
    }
    zip.finish().unwrap();
}

/// Pack classes into a JDK module (`JM` header, then a zip with `classes/` entries)
pub fn write_jmod(path: &Path, classes: &[(&str, ClassFile)]) {
    let mut zip = ZipWriter::new(Cursor::new(vec![]));
    for (name, class) in classes {
        zip.start_file(format!("classes/{}.class", name), FileOptions::default())
            .unwrap();
        zip.write_all(&class.to_bytes().unwrap()).unwrap();
    }
    let archive = zip.finish().unwrap().into_inner();

    let mut bytes = b"JM\x01\x00".to_vec();
    bytes.extend_from_slice(&archive);
    fs::write(path, bytes).unwrap();
}

/// JDK installation whose only module holds the given classes
pub fn fake_jdk(classes: &[(&str, ClassFile)]) -> PathBuf {
    let java_home = temp_dir("jdk");
    fs::create_dir_all(java_home.join("jmods")).unwrap();
    write_jmod(&java_home.join("jmods/java.base.jmod"), classes);
    java_home
}

/// `java/io` exceptions missing from the common classes every graph starts with
pub fn io_exception_classes() -> Vec<(&'static str, ClassFile)> {
    vec![
        (
            "java/io/FileNotFoundException",
            ClassBuilder::new("java/io/FileNotFoundException").finish("java/io/IOException"),
        ),
        (
            "java/io/EOFException",
            ClassBuilder::new("java/io/EOFException").finish("java/io/IOException"),
        ),
    ]
}

/// Operand bytes of an instruction referring to a class
fn class_bytes(constants: &mut ConstantsPool, name: &str) -> [u8; 2] {
    let ClassConstantIndex(ConstantIndex(index)) = constants.get_class(name).unwrap();
    index.to_be_bytes()
}

/// Operand bytes of an `invokespecial` of a no-argument constructor
fn constructor_bytes(constants: &mut ConstantsPool, class: &str) -> [u8; 2] {
    let MethodRefConstantIndex(ConstantIndex(index)) = constants
        .get_method_ref(class, "<init>", "()V", false)
        .unwrap();
    index.to_be_bytes()
}

/// `com/acme/Flow`, with methods that go through exception handlers, dead code, switches, and
/// merges of `java/io` exceptions
pub fn flow_class() -> ClassFile {
    let mut class = ClassBuilder::new("com/acme/Flow");

    // static int guarded(int n) {
    //   try { return n / 2; } catch (ArithmeticException e) { return -1; }
    // }
    // with an unreachable `iconst_0; ireturn` inside the handler range
    let arithmetic = class
        .constants
        .get_class("java/lang/ArithmeticException")
        .unwrap();
    let mut guarded = code(
        2,
        2,
        &[
            0x1a, // 0: iload_0
            0x05, // 1: iconst_2
            0x6c, // 2: idiv
            0xac, // 3: ireturn
            0x03, // 4: iconst_0 (dead)
            0xac, // 5: ireturn (dead)
            0x4c, // 6: astore_1
            0x02, // 7: iconst_m1
            0xac, // 8: ireturn
        ],
    );
    guarded.exception_table.push(ExceptionHandler {
        start_pc: 0,
        end_pc: 6,
        handler_pc: 6,
        catch_type: Some(arithmetic),
    });
    class.add_method(public_static(), "guarded", "(I)I", Some(guarded));

    // static int pick(int n) {
    //   switch (n) { case 0: return 1; case 1: return 2; default: return 0; }
    // }
    let pick = code(
        1,
        1,
        &[
            0x1a, // 0: iload_0
            0xaa, 0x00, 0x00, // 1: tableswitch (padded)
            0x00, 0x00, 0x00, 0x1b, // default: 28
            0x00, 0x00, 0x00, 0x00, // low: 0
            0x00, 0x00, 0x00, 0x01, // high: 1
            0x00, 0x00, 0x00, 0x17, // 0: 24
            0x00, 0x00, 0x00, 0x19, // 1: 26
            0x04, 0xac, // 24: iconst_1; ireturn
            0x05, 0xac, // 26: iconst_2; ireturn
            0x03, 0xac, // 28: iconst_0; ireturn
        ],
    );
    class.add_method(public_static(), "pick", "(I)I", Some(pick));

    // static IOException open(boolean missing) {
    //   return missing ? new FileNotFoundException() : new EOFException();
    // }
    let [fnf_hi, fnf_lo] = class_bytes(&mut class.constants, "java/io/FileNotFoundException");
    let [fnf_init_hi, fnf_init_lo] =
        constructor_bytes(&mut class.constants, "java/io/FileNotFoundException");
    let [eof_hi, eof_lo] = class_bytes(&mut class.constants, "java/io/EOFException");
    let [eof_init_hi, eof_init_lo] =
        constructor_bytes(&mut class.constants, "java/io/EOFException");
    let open = code(
        2,
        1,
        &[
            0x1a, // 0: iload_0
            0x99, 0x00, 0x0d, // 1: ifeq 14
            0xbb, fnf_hi, fnf_lo, // 4: new FileNotFoundException
            0x59, // 7: dup
            0xb7, fnf_init_hi, fnf_init_lo, // 8: invokespecial <init>
            0xa7, 0x00, 0x0a, // 11: goto 21
            0xbb, eof_hi, eof_lo, // 14: new EOFException
            0x59, // 17: dup
            0xb7, eof_init_hi, eof_init_lo, // 18: invokespecial <init>
            0xb0, // 21: areturn
        ],
    );
    class.add_method(public_static(), "open", "(Z)Ljava/io/IOException;", Some(open));

    class.finish("java/lang/Object")
}
