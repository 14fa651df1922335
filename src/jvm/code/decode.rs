use super::*;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, MethodRefConstantIndex,
};
use crate::jvm::{BaseType, DecodeErrorKind, Error};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashSet;

/// Decode a whole code array
///
/// Every jump target is checked to land on the first byte of an instruction.
pub fn decode_code(code: &[u8]) -> Result<Vec<DecodedInstruction>, Error> {
    if code.is_empty() {
        return Err(Error::Decode {
            offset: 0,
            kind: DecodeErrorKind::EmptyCode,
        });
    }

    let mut reader = CodeReader { code, position: 0 };
    let mut instructions = vec![];
    while !reader.is_done() {
        instructions.push(reader.next_instruction()?);
    }

    let starts: HashSet<u32> = instructions.iter().map(|insn| insn.offset).collect();
    for insn in &instructions {
        if let AnyInstruction::Branch(branch) = &insn.instruction {
            for target in branch.jump_targets() {
                if !starts.contains(&target) {
                    return Err(Error::Decode {
                        offset: insn.offset,
                        kind: DecodeErrorKind::BadBranchTarget(target as i64),
                    });
                }
            }
        }
    }

    Ok(instructions)
}

struct CodeReader<'a> {
    code: &'a [u8],
    position: usize,
}

impl<'a> CodeReader<'a> {
    fn is_done(&self) -> bool {
        self.position >= self.code.len()
    }

    fn truncated(&self, offset: u32) -> Error {
        Error::Decode {
            offset,
            kind: DecodeErrorKind::Truncated,
        }
    }

    /// Read `N` bytes through `read`, failing with `Truncated` (reported at `offset`)
    fn read<T, const N: usize>(
        &mut self,
        offset: u32,
        read: impl FnOnce(&mut &[u8]) -> std::io::Result<T>,
    ) -> Result<T, Error> {
        let end = self.position + N;
        if end > self.code.len() {
            return Err(self.truncated(offset));
        }
        let mut bytes = &self.code[self.position..end];
        let value = read(&mut bytes).map_err(|_| self.truncated(offset))?;
        self.position = end;
        Ok(value)
    }

    fn u8(&mut self, offset: u32) -> Result<u8, Error> {
        self.read::<_, 1>(offset, |r| r.read_u8())
    }

    fn i8(&mut self, offset: u32) -> Result<i8, Error> {
        self.read::<_, 1>(offset, |r| r.read_i8())
    }

    fn u16(&mut self, offset: u32) -> Result<u16, Error> {
        self.read::<_, 2>(offset, |r| r.read_u16::<BigEndian>())
    }

    fn i16(&mut self, offset: u32) -> Result<i16, Error> {
        self.read::<_, 2>(offset, |r| r.read_i16::<BigEndian>())
    }

    fn i32(&mut self, offset: u32) -> Result<i32, Error> {
        self.read::<_, 4>(offset, |r| r.read_i32::<BigEndian>())
    }

    /// Resolve a relative jump from the instruction at `offset`
    fn target(&self, offset: u32, relative: i64) -> Result<u32, Error> {
        let target = offset as i64 + relative;
        if target < 0 || target >= self.code.len() as i64 {
            Err(Error::Decode {
                offset,
                kind: DecodeErrorKind::BadBranchTarget(target),
            })
        } else {
            Ok(target as u32)
        }
    }

    fn short_target(&mut self, offset: u32) -> Result<u32, Error> {
        let relative = self.i16(offset)?;
        self.target(offset, relative as i64)
    }

    fn wide_target(&mut self, offset: u32) -> Result<u32, Error> {
        let relative = self.i32(offset)?;
        self.target(offset, relative as i64)
    }

    fn constant(&mut self, offset: u32) -> Result<ConstantIndex, Error> {
        self.u16(offset).map(ConstantIndex)
    }

    fn class(&mut self, offset: u32) -> Result<ClassConstantIndex, Error> {
        self.constant(offset).map(ClassConstantIndex)
    }

    fn field(&mut self, offset: u32) -> Result<FieldRefConstantIndex, Error> {
        self.constant(offset).map(FieldRefConstantIndex)
    }

    fn method(&mut self, offset: u32) -> Result<MethodRefConstantIndex, Error> {
        self.constant(offset).map(MethodRefConstantIndex)
    }

    /// Skip the 0-3 bytes of padding that align switch operands to a multiple of 4
    fn skip_switch_padding(&mut self, offset: u32) -> Result<(), Error> {
        while self.position % 4 != 0 {
            self.u8(offset)?;
        }
        Ok(())
    }

    fn next_instruction(&mut self) -> Result<DecodedInstruction, Error> {
        use BranchInstruction as B;
        use Instruction as I;

        let offset = self.position as u32;
        let opcode = self.u8(offset)?;
        let unsupported = || Error::UnsupportedInstruction { offset, opcode };

        let straight = |insn: Instruction| AnyInstruction::Straight(insn);
        let branch = |insn: BranchInstruction| AnyInstruction::Branch(insn);

        let instruction = match opcode {
            0x00 => straight(I::Nop),
            0x01 => straight(I::AConstNull),
            0x02 => straight(I::IConstM1),
            0x03 => straight(I::IConst0),
            0x04 => straight(I::IConst1),
            0x05 => straight(I::IConst2),
            0x06 => straight(I::IConst3),
            0x07 => straight(I::IConst4),
            0x08 => straight(I::IConst5),
            0x09 => straight(I::LConst0),
            0x0a => straight(I::LConst1),
            0x0b => straight(I::FConst0),
            0x0c => straight(I::FConst1),
            0x0d => straight(I::FConst2),
            0x0e => straight(I::DConst0),
            0x0f => straight(I::DConst1),
            0x10 => straight(I::BiPush(self.i8(offset)?)),
            0x11 => straight(I::SiPush(self.i16(offset)?)),
            0x12 => straight(I::Ldc(ConstantIndex(self.u8(offset)? as u16))),
            0x13 => straight(I::Ldc(self.constant(offset)?)),
            0x14 => straight(I::Ldc2(self.constant(offset)?)),

            0x15 => straight(I::ILoad(self.u8(offset)? as u16)),
            0x16 => straight(I::LLoad(self.u8(offset)? as u16)),
            0x17 => straight(I::FLoad(self.u8(offset)? as u16)),
            0x18 => straight(I::DLoad(self.u8(offset)? as u16)),
            0x19 => straight(I::ALoad(self.u8(offset)? as u16)),
            0x1a..=0x1d => straight(I::ILoad((opcode - 0x1a) as u16)),
            0x1e..=0x21 => straight(I::LLoad((opcode - 0x1e) as u16)),
            0x22..=0x25 => straight(I::FLoad((opcode - 0x22) as u16)),
            0x26..=0x29 => straight(I::DLoad((opcode - 0x26) as u16)),
            0x2a..=0x2d => straight(I::ALoad((opcode - 0x2a) as u16)),

            0x2e => straight(I::IALoad),
            0x2f => straight(I::LALoad),
            0x30 => straight(I::FALoad),
            0x31 => straight(I::DALoad),
            0x32 => straight(I::AALoad),
            0x33 => straight(I::BALoad),
            0x34 => straight(I::CALoad),
            0x35 => straight(I::SALoad),

            0x36 => straight(I::IStore(self.u8(offset)? as u16)),
            0x37 => straight(I::LStore(self.u8(offset)? as u16)),
            0x38 => straight(I::FStore(self.u8(offset)? as u16)),
            0x39 => straight(I::DStore(self.u8(offset)? as u16)),
            0x3a => straight(I::AStore(self.u8(offset)? as u16)),
            0x3b..=0x3e => straight(I::IStore((opcode - 0x3b) as u16)),
            0x3f..=0x42 => straight(I::LStore((opcode - 0x3f) as u16)),
            0x43..=0x46 => straight(I::FStore((opcode - 0x43) as u16)),
            0x47..=0x4a => straight(I::DStore((opcode - 0x47) as u16)),
            0x4b..=0x4e => straight(I::AStore((opcode - 0x4b) as u16)),

            0x4f => straight(I::IAStore),
            0x50 => straight(I::LAStore),
            0x51 => straight(I::FAStore),
            0x52 => straight(I::DAStore),
            0x53 => straight(I::AAStore),
            0x54 => straight(I::BAStore),
            0x55 => straight(I::CAStore),
            0x56 => straight(I::SAStore),

            0x57 => straight(I::Pop),
            0x58 => straight(I::Pop2),
            0x59 => straight(I::Dup),
            0x5a => straight(I::DupX1),
            0x5b => straight(I::DupX2),
            0x5c => straight(I::Dup2),
            0x5d => straight(I::Dup2X1),
            0x5e => straight(I::Dup2X2),
            0x5f => straight(I::Swap),

            0x60 => straight(I::IAdd),
            0x61 => straight(I::LAdd),
            0x62 => straight(I::FAdd),
            0x63 => straight(I::DAdd),
            0x64 => straight(I::ISub),
            0x65 => straight(I::LSub),
            0x66 => straight(I::FSub),
            0x67 => straight(I::DSub),
            0x68 => straight(I::IMul),
            0x69 => straight(I::LMul),
            0x6a => straight(I::FMul),
            0x6b => straight(I::DMul),
            0x6c => straight(I::IDiv),
            0x6d => straight(I::LDiv),
            0x6e => straight(I::FDiv),
            0x6f => straight(I::DDiv),
            0x70 => straight(I::IRem),
            0x71 => straight(I::LRem),
            0x72 => straight(I::FRem),
            0x73 => straight(I::DRem),
            0x74 => straight(I::INeg),
            0x75 => straight(I::LNeg),
            0x76 => straight(I::FNeg),
            0x77 => straight(I::DNeg),
            0x78 => straight(I::ISh(ShiftType::Left)),
            0x79 => straight(I::LSh(ShiftType::Left)),
            0x7a => straight(I::ISh(ShiftType::ArithmeticRight)),
            0x7b => straight(I::LSh(ShiftType::ArithmeticRight)),
            0x7c => straight(I::ISh(ShiftType::LogicalRight)),
            0x7d => straight(I::LSh(ShiftType::LogicalRight)),
            0x7e => straight(I::IAnd),
            0x7f => straight(I::LAnd),
            0x80 => straight(I::IOr),
            0x81 => straight(I::LOr),
            0x82 => straight(I::IXor),
            0x83 => straight(I::LXor),
            0x84 => {
                let index = self.u8(offset)? as u16;
                let increment = self.i8(offset)? as i16;
                straight(I::IInc(index, increment))
            }

            0x85 => straight(I::I2L),
            0x86 => straight(I::I2F),
            0x87 => straight(I::I2D),
            0x88 => straight(I::L2I),
            0x89 => straight(I::L2F),
            0x8a => straight(I::L2D),
            0x8b => straight(I::F2I),
            0x8c => straight(I::F2L),
            0x8d => straight(I::F2D),
            0x8e => straight(I::D2I),
            0x8f => straight(I::D2L),
            0x90 => straight(I::D2F),
            0x91 => straight(I::I2B),
            0x92 => straight(I::I2C),
            0x93 => straight(I::I2S),

            0x94 => straight(I::LCmp),
            0x95 => straight(I::FCmp(CompareMode::L)),
            0x96 => straight(I::FCmp(CompareMode::G)),
            0x97 => straight(I::DCmp(CompareMode::L)),
            0x98 => straight(I::DCmp(CompareMode::G)),

            0x99..=0x9e => {
                let comparison = ord_comparison(opcode - 0x99);
                branch(B::If(comparison, self.short_target(offset)?))
            }
            0x9f..=0xa4 => {
                let comparison = ord_comparison(opcode - 0x9f);
                branch(B::IfICmp(comparison, self.short_target(offset)?))
            }
            0xa5 => branch(B::IfACmp(EqComparison::EQ, self.short_target(offset)?)),
            0xa6 => branch(B::IfACmp(EqComparison::NE, self.short_target(offset)?)),
            0xa7 => branch(B::Goto(self.short_target(offset)?)),

            // `jsr` and `ret` are not allowed in class files that have stack map tables
            0xa8 | 0xa9 | 0xc9 => return Err(unsupported()),

            0xaa => {
                self.skip_switch_padding(offset)?;
                let default = self.wide_target(offset)?;
                let low = self.i32(offset)?;
                let high = self.i32(offset)?;
                if low > high {
                    return Err(Error::Decode {
                        offset,
                        kind: DecodeErrorKind::BadSwitchRange { low, high },
                    });
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                if self.position + count * 4 > self.code.len() {
                    return Err(self.truncated(offset));
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(self.wide_target(offset)?);
                }
                branch(B::TableSwitch {
                    default,
                    low,
                    targets,
                })
            }
            0xab => {
                self.skip_switch_padding(offset)?;
                let default = self.wide_target(offset)?;
                let npairs = self.i32(offset)?;
                if npairs < 0 || self.position + npairs as usize * 8 > self.code.len() {
                    return Err(self.truncated(offset));
                }
                let mut targets = Vec::with_capacity(npairs as usize);
                for _ in 0..npairs {
                    let key = self.i32(offset)?;
                    targets.push((key, self.wide_target(offset)?));
                }
                branch(B::LookupSwitch { default, targets })
            }

            0xac => branch(B::IReturn),
            0xad => branch(B::LReturn),
            0xae => branch(B::FReturn),
            0xaf => branch(B::DReturn),
            0xb0 => branch(B::AReturn),
            0xb1 => branch(B::Return),

            0xb2 => straight(I::GetStatic(self.field(offset)?)),
            0xb3 => straight(I::PutStatic(self.field(offset)?)),
            0xb4 => straight(I::GetField(self.field(offset)?)),
            0xb5 => straight(I::PutField(self.field(offset)?)),
            0xb6 => straight(I::Invoke(InvokeType::Virtual, self.method(offset)?)),
            0xb7 => straight(I::Invoke(InvokeType::Special, self.method(offset)?)),
            0xb8 => straight(I::Invoke(InvokeType::Static, self.method(offset)?)),
            0xb9 => {
                let method = self.method(offset)?;
                let count = self.u8(offset)?;
                let _zero = self.u8(offset)?;
                straight(I::Invoke(InvokeType::Interface(count), method))
            }
            0xba => {
                let call_site = self.constant(offset)?;
                let _zero = self.u16(offset)?;
                straight(I::InvokeDynamic(call_site))
            }
            0xbb => straight(I::New(self.class(offset)?)),
            0xbc => {
                let atype = self.u8(offset)?;
                let base_type = match atype {
                    4 => BaseType::Boolean,
                    5 => BaseType::Char,
                    6 => BaseType::Float,
                    7 => BaseType::Double,
                    8 => BaseType::Byte,
                    9 => BaseType::Short,
                    10 => BaseType::Int,
                    11 => BaseType::Long,
                    other => {
                        return Err(Error::Decode {
                            offset,
                            kind: DecodeErrorKind::BadArrayType(other),
                        })
                    }
                };
                straight(I::NewArray(base_type))
            }
            0xbd => straight(I::ANewArray(self.class(offset)?)),
            0xbe => straight(I::ArrayLength),
            0xbf => branch(B::AThrow),
            0xc0 => straight(I::CheckCast(self.class(offset)?)),
            0xc1 => straight(I::InstanceOf(self.class(offset)?)),
            0xc2 => straight(I::MonitorEnter),
            0xc3 => straight(I::MonitorExit),
            0xc4 => {
                let modified = self.u8(offset)?;
                match modified {
                    0x15 => straight(I::ILoad(self.u16(offset)?)),
                    0x16 => straight(I::LLoad(self.u16(offset)?)),
                    0x17 => straight(I::FLoad(self.u16(offset)?)),
                    0x18 => straight(I::DLoad(self.u16(offset)?)),
                    0x19 => straight(I::ALoad(self.u16(offset)?)),
                    0x36 => straight(I::IStore(self.u16(offset)?)),
                    0x37 => straight(I::LStore(self.u16(offset)?)),
                    0x38 => straight(I::FStore(self.u16(offset)?)),
                    0x39 => straight(I::DStore(self.u16(offset)?)),
                    0x3a => straight(I::AStore(self.u16(offset)?)),
                    0x84 => {
                        let index = self.u16(offset)?;
                        let increment = self.i16(offset)?;
                        straight(I::IInc(index, increment))
                    }
                    0xa9 => {
                        return Err(Error::UnsupportedInstruction {
                            offset,
                            opcode: modified,
                        })
                    }
                    other => {
                        return Err(Error::Decode {
                            offset,
                            kind: DecodeErrorKind::BadWideOpcode(other),
                        })
                    }
                }
            }
            0xc5 => {
                let class = self.class(offset)?;
                let dimensions = self.u8(offset)?;
                straight(I::MultiANewArray(class, dimensions))
            }
            0xc6 => branch(B::IfNull(EqComparison::EQ, self.short_target(offset)?)),
            0xc7 => branch(B::IfNull(EqComparison::NE, self.short_target(offset)?)),
            0xc8 => branch(B::Goto(self.wide_target(offset)?)),

            other => {
                return Err(Error::Decode {
                    offset,
                    kind: DecodeErrorKind::UnknownOpcode(other),
                })
            }
        };

        Ok(DecodedInstruction {
            offset,
            next_offset: self.position as u32,
            instruction,
        })
    }
}

/// Comparisons in opcode order (`eq`, `ne`, `lt`, `ge`, `gt`, `le`)
fn ord_comparison(n: u8) -> OrdComparison {
    match n {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(code: &[u8]) -> Vec<(u32, AnyInstruction)> {
        decode_code(code)
            .unwrap()
            .into_iter()
            .map(|insn| (insn.offset, insn.instruction))
            .collect()
    }

    #[test]
    fn straight_line() {
        // iconst_1; istore_1; wide iinc 1 300; iload 1; ireturn
        let code = [0x04, 0x3c, 0xc4, 0x84, 0x00, 0x01, 0x01, 0x2c, 0x15, 0x01, 0xac];
        assert_eq!(
            kinds(&code),
            vec![
                (0, AnyInstruction::Straight(Instruction::IConst1)),
                (1, AnyInstruction::Straight(Instruction::IStore(1))),
                (2, AnyInstruction::Straight(Instruction::IInc(1, 300))),
                (8, AnyInstruction::Straight(Instruction::ILoad(1))),
                (10, AnyInstruction::Branch(BranchInstruction::IReturn)),
            ]
        );
    }

    #[test]
    fn branches_are_absolute() {
        // 0: iload_0; 1: ifeq +5; 4: goto -4; 7: return
        let code = [0x1a, 0x99, 0x00, 0x05, 0xa7, 0xff, 0xfc, 0xb1];
        let decoded = decode_code(&code);
        assert!(matches!(
            decoded,
            Err(Error::Decode {
                offset: 1,
                kind: DecodeErrorKind::BadBranchTarget(6)
            })
        ));

        let code = [0x1a, 0x99, 0x00, 0x06, 0xa7, 0xff, 0xfc, 0xb1];
        assert_eq!(
            kinds(&code),
            vec![
                (0, AnyInstruction::Straight(Instruction::ILoad(0))),
                (
                    1,
                    AnyInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, 7))
                ),
                (4, AnyInstruction::Branch(BranchInstruction::Goto(0))),
                (7, AnyInstruction::Branch(BranchInstruction::Return)),
            ]
        );
    }

    #[test]
    fn switches_skip_padding() {
        let mut code = vec![0x1a, 0xaa, 0x00, 0x00]; // iload_0; tableswitch (padded to 4)
        code.extend_from_slice(&26i32.to_be_bytes()); // default
        code.extend_from_slice(&1i32.to_be_bytes()); // low
        code.extend_from_slice(&2i32.to_be_bytes()); // high
        code.extend_from_slice(&23i32.to_be_bytes());
        code.extend_from_slice(&24i32.to_be_bytes());
        code.extend_from_slice(&[0x00, 0x00, 0x00, 0xb1]); // 24: nop; 25: nop; 26: nop; 27: return

        let decoded = decode_code(&code).unwrap();
        assert_eq!(
            decoded[1].instruction,
            AnyInstruction::Branch(BranchInstruction::TableSwitch {
                default: 27,
                low: 1,
                targets: vec![24, 25],
            })
        );
        assert_eq!(decoded[1].next_offset, 24);
        assert_eq!(decoded.last().unwrap().offset, 27);
    }

    #[test]
    fn lookupswitch() {
        let mut code = vec![0x1a, 0xab, 0x00, 0x00]; // iload_0; lookupswitch
        code.extend_from_slice(&22i32.to_be_bytes()); // default
        code.extend_from_slice(&1i32.to_be_bytes()); // npairs
        code.extend_from_slice(&(-7i32).to_be_bytes());
        code.extend_from_slice(&21i32.to_be_bytes());
        // 20: return, 21: return, 22: nop, 23: return
        code.extend_from_slice(&[0xb1, 0xb1, 0x00, 0xb1]);

        let decoded = decode_code(&code).unwrap();
        assert_eq!(
            decoded[1].instruction,
            AnyInstruction::Branch(BranchInstruction::LookupSwitch {
                default: 23,
                targets: vec![(-7, 22)],
            })
        );
    }

    #[test]
    fn rejects_bad_code() {
        assert!(matches!(
            decode_code(&[]),
            Err(Error::Decode {
                kind: DecodeErrorKind::EmptyCode,
                ..
            })
        ));
        assert!(matches!(
            decode_code(&[0x11, 0x00]),
            Err(Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::Truncated
            })
        ));
        assert!(matches!(
            decode_code(&[0x00, 0xfe]),
            Err(Error::Decode {
                offset: 1,
                kind: DecodeErrorKind::UnknownOpcode(0xfe)
            })
        ));
        assert!(matches!(
            decode_code(&[0xc4, 0x60]),
            Err(Error::Decode {
                kind: DecodeErrorKind::BadWideOpcode(0x60),
                ..
            })
        ));
        assert!(matches!(
            decode_code(&[0xa8, 0x00, 0x03, 0xb1]),
            Err(Error::UnsupportedInstruction {
                offset: 0,
                opcode: 0xa8
            })
        ));
        assert!(matches!(
            decode_code(&[0xa7, 0x00, 0x10]),
            Err(Error::Decode {
                kind: DecodeErrorKind::BadBranchTarget(16),
                ..
            })
        ));
    }
}
