use super::{Deserialize, Serialize};
use crate::jvm::ClassFormatError;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone, Copy)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// Java SE 6, the first version that understands `StackMapTable`
    pub const JAVA6: Version = Version {
        minor_version: 0,
        major_version: 50,
    };

    /// Java SE 7, the first version that requires `StackMapTable`
    pub const JAVA7: Version = Version {
        minor_version: 0,
        major_version: 51,
    };

    pub const JAVA8: Version = Version {
        minor_version: 0,
        major_version: 52,
    };

    /// Whether a JVM loading this class reads `StackMapTable` attributes at all
    pub fn uses_stack_maps(&self) -> bool {
        *self >= Version::JAVA6
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, ClassFormatError> {
        let minor_version = u16::deserialize(reader)?;
        let major_version = u16::deserialize(reader)?;
        Ok(Version {
            major_version,
            minor_version,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering_is_major_first() {
        let old = Version {
            major_version: 49,
            minor_version: 3,
        };
        assert!(old < Version::JAVA6);
        assert!(!old.uses_stack_maps());
        assert!(Version::JAVA8.uses_stack_maps());
    }
}
