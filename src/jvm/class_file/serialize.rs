use crate::jvm::ClassFormatError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result};

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Counterpart of [`Serialize`] for reading class files back in
pub trait Deserialize: Sized {
    /// Read the construct from a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ClassFormatError>;
}

macro_rules! primitive_serialization {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Serialize for $ty {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                writer.$write::<BigEndian>(*self)
            }
        }

        impl Deserialize for $ty {
            fn deserialize<R: ReadBytesExt>(
                reader: &mut R,
            ) -> std::result::Result<Self, ClassFormatError> {
                Ok(reader.$read::<BigEndian>()?)
            }
        }
    };
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ClassFormatError> {
        Ok(reader.read_u8()?)
    }
}

primitive_serialization!(u16, write_u16, read_u16);
primitive_serialization!(u32, write_u32, read_u32);
primitive_serialization!(u64, write_u64, read_u64);
primitive_serialization!(i16, write_i16, read_i16);
primitive_serialization!(i32, write_i32, read_i32);
primitive_serialization!(i64, write_i64, read_i64);

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ClassFormatError> {
        let len = u16::deserialize(reader)?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::deserialize(reader)?);
        }
        Ok(elems)
    }
}

/// Read a `u32` length followed by that many bytes
///
/// The length is not trusted for allocation: the bytes are read incrementally.
pub fn read_length_prefixed<R: ReadBytesExt>(
    reader: &mut R,
) -> std::result::Result<Vec<u8>, ClassFormatError> {
    let len = u32::deserialize(reader)? as u64;
    let mut bytes = vec![];
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(ClassFormatError::Truncated);
    }
    Ok(bytes)
}

/// Write a `u32` length followed by the bytes
pub fn write_length_prefixed<W: WriteBytesExt>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    (bytes.len() as u32).serialize(writer)?;
    writer.write_all(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn big_endian_primitives() {
        let mut bytes = vec![];
        0xCAFEu16.serialize(&mut bytes).unwrap();
        (-2i32).serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0xCA, 0xFE, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut reader: &[u8] = &bytes;
        assert_eq!(u16::deserialize(&mut reader).unwrap(), 0xCAFE);
        assert_eq!(i32::deserialize(&mut reader).unwrap(), -2);
        assert!(matches!(
            u8::deserialize(&mut reader),
            Err(ClassFormatError::Truncated)
        ));
    }

    #[test]
    fn vectors_are_u16_counted() {
        let mut bytes = vec![];
        vec![1u16, 2, 3].serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 3, 0, 1, 0, 2, 0, 3]);

        let mut reader: &[u8] = &bytes;
        assert_eq!(Vec::<u16>::deserialize(&mut reader).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn length_prefixed_bytes() {
        let mut bytes = vec![];
        write_length_prefixed(&mut bytes, &[7, 8]).unwrap();
        let mut reader: &[u8] = &bytes;
        assert_eq!(read_length_prefixed(&mut reader).unwrap(), vec![7, 8]);

        let mut lying: &[u8] = &[0, 0, 0, 9, 1, 2];
        assert!(matches!(
            read_length_prefixed(&mut lying),
            Err(ClassFormatError::Truncated)
        ));
    }
}
