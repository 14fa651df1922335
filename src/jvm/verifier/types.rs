use crate::jvm::class_file::{ClassConstantIndex, ConstantsPool, Deserialize, Serialize};
use crate::jvm::class_graph::{ClassGraph, UnknownClass};
use crate::jvm::{BaseType, BinaryName, ClassFormatError, Error, FieldType, RefType};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot (never initialized, second half of a `long`/`double`, or a merge of
    /// incompatible types)
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    ///   - during analysis, we use `UninitializedRef` for `U`, tracking the offset of the `new`
    ///     instruction and the type the object will have once it is initialized
    ///   - when serializing into a classfile, we use `u16` for `U`, corresponding to the offset of
    ///     the `new` instruction from the start of the method body
    Uninitialized(U),
}

/// Verification type used while analyzing a method
pub type VType = VerificationType<RefType<BinaryName>, UninitializedRef>;

/// Object created by `new` whose constructor has not run yet
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct UninitializedRef {
    /// Offset of the `new` instruction
    pub new_offset: u16,

    /// Type the object will have once it is initialized
    pub class: RefType<BinaryName>,
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    pub fn map<C2, U2>(
        &self,
        map_class: impl Fn(&Cls) -> C2,
        map_uninitialized: impl Fn(&U) -> U2,
    ) -> VerificationType<C2, U2> {
        match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)),
            VerificationType::Uninitialized(uninit) => {
                VerificationType::Uninitialized(map_uninitialized(uninit))
            }
        }
    }
}

impl<C, U> From<FieldType<C>> for VerificationType<RefType<C>, U> {
    fn from(field_type: FieldType<C>) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type),
        }
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl VType {
    /// Merge two types flowing into the same local variable slot
    ///
    /// Types that have nothing in common merge to `Top`.
    pub fn merge_local(
        &self,
        other: &VType,
        class_graph: &ClassGraph,
    ) -> Result<VType, UnknownClass> {
        Ok(self
            .merge(other, class_graph)?
            .unwrap_or(VerificationType::Top))
    }

    /// Merge two types flowing into the same operand stack slot
    ///
    /// Unlike locals, the operand stack has no room for an unusable value: `None` means the two
    /// types cannot be reconciled.
    pub fn merge(
        &self,
        other: &VType,
        class_graph: &ClassGraph,
    ) -> Result<Option<VType>, UnknownClass> {
        use VerificationType::*;

        if self == other {
            return Ok(Some(self.clone()));
        }
        Ok(match (self, other) {
            (Null, Object(_)) => Some(other.clone()),
            (Object(_), Null) => Some(self.clone()),
            (Object(ref1), Object(ref2)) => Some(Object(merge_ref_types(ref1, ref2, class_graph)?)),
            _ => None,
        })
    }

    /// Resolve the type into its serializable form, adding class constants where needed
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<VerificationType<ClassConstantIndex, u16>, Error> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(ref_type) => {
                VerificationType::Object(constants.get_class(&ref_type.class_name())?)
            }
            VerificationType::Uninitialized(uninitialized) => {
                VerificationType::Uninitialized(uninitialized.new_offset)
            }
        })
    }

    /// Short human readable rendering (used in error messages)
    pub fn describe(&self) -> String {
        match self {
            VerificationType::Top => String::from("top"),
            VerificationType::Integer => String::from("int"),
            VerificationType::Float => String::from("float"),
            VerificationType::Long => String::from("long"),
            VerificationType::Double => String::from("double"),
            VerificationType::Null => String::from("null"),
            VerificationType::UninitializedThis => String::from("uninitializedThis"),
            VerificationType::Object(ref_type) => ref_type.class_name(),
            VerificationType::Uninitialized(uninitialized) => format!(
                "uninitialized({}, {})",
                uninitialized.new_offset,
                uninitialized.class.class_name()
            ),
        }
    }
}

/// Least general reference type that both reference types can be assigned to
///
///   - classes merge to their least common superclass
///   - arrays of references merge element-wise
///   - everything else (primitive arrays of different types, arrays with classes) merge to
///     `java/lang/Object`
pub fn merge_ref_types(
    ref1: &RefType<BinaryName>,
    ref2: &RefType<BinaryName>,
    class_graph: &ClassGraph,
) -> Result<RefType<BinaryName>, UnknownClass> {
    if ref1 == ref2 {
        return Ok(ref1.clone());
    }
    Ok(match (ref1, ref2) {
        (RefType::Object(class1), RefType::Object(class2)) => {
            RefType::Object(class_graph.common_super_class(class1, class2)?)
        }
        _ if ref1.is_array() && ref2.is_array() => {
            match (ref1.component_type(), ref2.component_type()) {
                (Some(FieldType::Ref(elem1)), Some(FieldType::Ref(elem2))) => {
                    let merged = merge_ref_types(&elem1, &elem2, class_graph)?;
                    RefType::array(FieldType::Ref(merged))
                }
                _ => RefType::Object(BinaryName::OBJECT),
            }
        }
        _ => RefType::Object(BinaryName::OBJECT),
    })
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType<ClassConstantIndex, u16> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, ClassFormatError> {
        Ok(match u8::deserialize(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(ClassConstantIndex::deserialize(reader)?),
            8 => VerificationType::Uninitialized(u16::deserialize(reader)?),
            other => return Err(ClassFormatError::UnknownVerificationTag(other)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassPath;
    use crate::jvm::Name;

    fn object(name: &str) -> VType {
        VerificationType::Object(RefType::Object(BinaryName::from_str(name).unwrap()))
    }

    #[test]
    fn merging() {
        let graph = ClassGraph::new(ClassPath::empty());
        use VerificationType::*;

        assert_eq!(Integer.merge(&Integer, &graph), Ok(Some(Integer)));
        assert_eq!(Integer.merge(&Float, &graph), Ok(None));
        assert_eq!(Integer.merge_local(&Float, &graph), Ok(Top));
        assert_eq!(Long.merge_local(&Top, &graph), Ok(Top));

        let string = object("java/lang/String");
        assert_eq!(Null.merge(&string, &graph), Ok(Some(string.clone())));
        assert_eq!(string.merge(&Null, &graph), Ok(Some(string.clone())));
        assert_eq!(
            string.merge(&object("java/lang/Integer"), &graph),
            Ok(Some(object("java/lang/Object")))
        );
        assert_eq!(
            object("java/lang/ArithmeticException")
                .merge(&object("java/lang/IllegalArgumentException"), &graph),
            Ok(Some(object("java/lang/RuntimeException")))
        );
        assert_eq!(UninitializedThis.merge(&string, &graph), Ok(None));
    }

    #[test]
    fn merging_arrays() {
        let graph = ClassGraph::new(ClassPath::empty());
        let parse = |desc: &str| RefType::from_class_name(desc).unwrap();

        assert_eq!(
            merge_ref_types(&parse("[Ljava/lang/Integer;"), &parse("[Ljava/lang/Long;"), &graph),
            Ok(parse("[Ljava/lang/Number;"))
        );
        assert_eq!(
            merge_ref_types(&parse("[[I"), &parse("[[J"), &graph),
            Ok(parse("[Ljava/lang/Object;"))
        );
        assert_eq!(
            merge_ref_types(&parse("[I"), &parse("[J"), &graph),
            Ok(parse("java/lang/Object"))
        );
        assert_eq!(
            merge_ref_types(&parse("[I"), &parse("java/lang/String"), &graph),
            Ok(parse("java/lang/Object"))
        );
    }

    #[test]
    fn serialized_tags() {
        let mut bytes = vec![];
        VerificationType::<ClassConstantIndex, u16>::Uninitialized(0x0102)
            .serialize(&mut bytes)
            .unwrap();
        VerificationType::<ClassConstantIndex, u16>::Top
            .serialize(&mut bytes)
            .unwrap();
        assert_eq!(bytes, vec![8, 1, 2, 0]);

        type Serialized = VerificationType<ClassConstantIndex, u16>;
        let mut reader: &[u8] = &bytes;
        assert_eq!(
            Serialized::deserialize(&mut reader).unwrap(),
            Serialized::Uninitialized(0x0102)
        );
        assert_eq!(Serialized::deserialize(&mut reader).unwrap(), Serialized::Top);

        let mut bad: &[u8] = &[9];
        assert!(matches!(
            VerificationType::<ClassConstantIndex, u16>::deserialize(&mut bad),
            Err(ClassFormatError::UnknownVerificationTag(9))
        ));
    }
}
