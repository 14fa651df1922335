use crate::jvm::class_file::{
    Attribute, ClassConstantIndex, ConstantsPool, Deserialize, Field, Method, Serialize, Version,
};
use crate::jvm::{BinaryName, ClassAccessFlags, ClassFormatError, Error, Name};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Only `java/lang/Object` has no superclass
    pub super_class: Option<ClassConstantIndex>,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Decode a complete class file, rejecting trailing bytes
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, ClassFormatError> {
        let mut reader = bytes;
        let class_file = ClassFile::deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(ClassFormatError::TrailingBytes(reader.len()));
        }
        Ok(class_file)
    }

    /// Encode the class file into a fresh buffer
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Internal name of the class (`com/acme/Foo`)
    pub fn this_class_name(&self) -> Result<BinaryName, Error> {
        let name = self.constants.class_name(self.this_class)?;
        BinaryName::from_string(name).map_err(Error::BadName)
    }

    /// Internal name of the superclass
    pub fn super_class_name(&self) -> Result<Option<BinaryName>, Error> {
        match self.super_class {
            None => Ok(None),
            Some(super_class) => {
                let name = self.constants.class_name(super_class)?;
                BinaryName::from_string(name)
                    .map(Some)
                    .map_err(Error::BadName)
            }
        }
    }

    /// Internal names of the directly implemented interfaces
    pub fn interface_names(&self) -> Result<Vec<BinaryName>, Error> {
        self.interfaces
            .iter()
            .map(|interface| {
                let name = self.constants.class_name(*interface)?;
                BinaryName::from_string(name).map_err(Error::BadName)
            })
            .collect()
    }

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::io::Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut class_file = fs::File::create(path)?;
        self.serialize(&mut class_file)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        match self.super_class {
            Some(super_class) => super_class.serialize(writer)?,
            None => 0u16.serialize(writer)?,
        }
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, ClassFormatError> {
        let magic = u32::deserialize(reader)?;
        if magic.to_be_bytes() != ClassFile::MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let version = Version::deserialize(reader)?;
        let constants = ConstantsPool::deserialize(reader)?;
        let access_flags = ClassAccessFlags::deserialize(reader)?;
        let this_class = ClassConstantIndex::deserialize(reader)?;
        let super_class = match ClassConstantIndex::deserialize(reader)? {
            ClassConstantIndex(idx) if idx.0 == 0 => None,
            super_class => Some(super_class),
        };
        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tiny_class() -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class("com/acme/Tiny").unwrap();
        let super_class = constants.get_class("java/lang/Object").unwrap();
        let name_index = constants.get_utf8("nothing").unwrap();
        let descriptor_index = constants.get_utf8("()V").unwrap();
        ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class: Some(super_class),
            interfaces: vec![],
            fields: vec![],
            methods: vec![Method {
                access_flags: crate::jvm::MethodAccessFlags::ABSTRACT,
                name_index,
                descriptor_index,
                attributes: vec![],
            }],
            attributes: vec![],
        }
    }

    #[test]
    fn encode_then_parse() {
        let class = tiny_class();
        let bytes = class.to_bytes().unwrap();
        assert_eq!(&bytes[0..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]);

        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed.this_class_name().unwrap().as_str(), "com/acme/Tiny");
        assert_eq!(parsed.super_class_name().unwrap(), Some(BinaryName::OBJECT));
        assert_eq!(parsed.methods, class.methods);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_input() {
        let mut bytes = tiny_class().to_bytes().unwrap();

        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 1]),
            Err(ClassFormatError::Truncated)
        ));

        bytes.push(0);
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(ClassFormatError::TrailingBytes(1))
        ));

        bytes[0] = 0;
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(ClassFormatError::BadMagic(0x00FE_BABE))
        ));
    }
}
