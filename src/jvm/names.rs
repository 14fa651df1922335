use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};
use std::path::PathBuf;

/// Names of methods and fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in their internal form (`java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    fn as_cow(&self) -> &Cow<'static, str>;

    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;

    fn from_str(name: &str) -> Result<Self, String> {
        Self::from_string(name.to_owned())
    }
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Binary name is empty"))
        } else {
            name.split('/').try_for_each(UnqualifiedName::check_valid)
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Path of the class file for this class, relative to a class path root
    ///
    /// `com/acme/Foo` is stored in `com/acme/Foo.class`
    pub fn class_file_path(&self) -> PathBuf {
        let mut path: PathBuf = self.as_str().split('/').collect();
        path.set_extension("class");
        path
    }

    /// Entry name of the class file for this class inside a jar (always `/` separated)
    pub fn class_file_entry(&self) -> String {
        format!("{}.class", self.as_str())
    }

    /// Number of package segments before the simple name
    pub fn package_depth(&self) -> usize {
        self.as_str().matches('/').count()
    }

    // JDK names
    pub const ABSTRACTSTRINGBUILDER: Self = Self::name("java/lang/AbstractStringBuilder");
    pub const APPENDABLE: Self = Self::name("java/lang/Appendable");
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const ARRAYINDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/ArrayIndexOutOfBoundsException");
    pub const ASSERTIONERROR: Self = Self::name("java/lang/AssertionError");
    pub const AUTOCLOSEABLE: Self = Self::name("java/lang/AutoCloseable");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ENUM: Self = Self::name("java/lang/Enum");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALSTATEEXCEPTION: Self = Self::name("java/lang/IllegalStateException");
    pub const INDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/IndexOutOfBoundsException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const ITERABLE: Self = Self::name("java/lang/Iterable");
    pub const LINKAGEERROR: Self = Self::name("java/lang/LinkageError");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const NUMBERFORMATEXCEPTION: Self = Self::name("java/lang/NumberFormatException");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const STRINGBUILDER: Self = Self::name("java/lang/StringBuilder");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const UNSUPPORTEDOPERATIONEXCEPTION: Self =
        Self::name("java/lang/UnsupportedOperationException");

    pub const CLOSEABLE: Self = Self::name("java/io/Closeable");
    pub const FLUSHABLE: Self = Self::name("java/io/Flushable");
    pub const INPUTSTREAM: Self = Self::name("java/io/InputStream");
    pub const IOEXCEPTION: Self = Self::name("java/io/IOException");
    pub const OUTPUTSTREAM: Self = Self::name("java/io/OutputStream");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const UNCHECKEDIOEXCEPTION: Self = Self::name("java/io/UncheckedIOException");

    pub const ABSTRACTCOLLECTION: Self = Self::name("java/util/AbstractCollection");
    pub const ABSTRACTLIST: Self = Self::name("java/util/AbstractList");
    pub const ABSTRACTMAP: Self = Self::name("java/util/AbstractMap");
    pub const ARRAYLIST: Self = Self::name("java/util/ArrayList");
    pub const COLLECTION: Self = Self::name("java/util/Collection");
    pub const HASHMAP: Self = Self::name("java/util/HashMap");
    pub const ITERATOR: Self = Self::name("java/util/Iterator");
    pub const LIST: Self = Self::name("java/util/List");
    pub const MAP: Self = Self::name("java/util/Map");
    pub const NOSUCHELEMENTEXCEPTION: Self = Self::name("java/util/NoSuchElementException");
    pub const RANDOMACCESS: Self = Self::name("java/util/RandomAccess");
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    #[test]
    fn binary_names() {
        assert!(BinaryName::from_str("java/lang/Object").is_ok());
        assert!(BinaryName::from_str("Foo$Bar").is_ok());
        assert!(BinaryName::from_str("").is_err());
        assert!(BinaryName::from_str("java.lang.Object").is_err());
        assert!(BinaryName::from_str("java//Object").is_err());
        assert!(BinaryName::from_str("[I").is_err());
    }

    #[test]
    fn unqualified_names() {
        assert!(UnqualifiedName::from_str("main").is_ok());
        assert!(UnqualifiedName::from_str("<init>").is_ok());
        assert!(UnqualifiedName::from_str("a/b").is_err());
        assert!(UnqualifiedName::from_str("a;").is_err());
    }

    #[test]
    fn class_file_locations() {
        let name = BinaryName::from_str("com/acme/Foo").unwrap();
        assert_eq!(
            name.class_file_path(),
            Path::new("com").join("acme").join("Foo.class")
        );
        assert_eq!(name.class_file_entry(), "com/acme/Foo.class");
        assert_eq!(name.package_depth(), 2);
        assert_eq!(BinaryName::OBJECT.package_depth(), 2);

        let name = BinaryName::from_str("Foo").unwrap();
        assert_eq!(name.class_file_path(), Path::new("Foo.class"));
        assert_eq!(name.package_depth(), 0);
    }
}
