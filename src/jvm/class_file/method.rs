use crate::jvm::class_file::{
    Attribute, Code, ConstantsPool, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::{ClassFormatError, MethodAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Method {
    pub fn name(&self, constants: &ConstantsPool) -> Result<String, ClassFormatError> {
        constants.utf8(self.name_index)
    }

    pub fn descriptor(&self, constants: &ConstantsPool) -> Result<String, ClassFormatError> {
        constants.utf8(self.descriptor_index)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Position of the `Code` attribute (absent for `abstract` and `native` methods)
    pub fn code_attribute_index(&self, constants: &ConstantsPool) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.is::<Code>(constants))
    }

    /// Decoded `Code` attribute, if there is one
    pub fn code(&self, constants: &ConstantsPool) -> Result<Option<Code>, ClassFormatError> {
        match self.code_attribute_index(constants) {
            None => Ok(None),
            Some(idx) => self.attributes[idx].decode::<Code>().map(Some),
        }
    }

    /// Replace the `Code` attribute in place (or add one if there was none)
    pub fn set_code(&mut self, constants: &ConstantsPool, code: Attribute) {
        match self.code_attribute_index(constants) {
            Some(idx) => self.attributes[idx] = code,
            None => self.attributes.push(code),
        }
    }
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, ClassFormatError> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}
