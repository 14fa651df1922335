use super::*;
use crate::jvm::class_file::{Code, ConstantsPool};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::code::{decode_code, AnyInstruction, DecodedInstruction};
use crate::jvm::{
    BinaryName, DecodeErrorKind, Error, MethodDescriptor, RefType, VerifierErrorKind,
};
use crate::util::{OffsetVec, Width};
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// What the verifier needs to know about a method besides its code
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Class declaring the method
    pub class: BinaryName,
    pub name: String,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_static: bool,
}

impl MethodSignature {
    /// Frame on entry to the method
    ///
    /// The receiver (if any) and the parameters fill the first locals, and the rest are `Top`.
    pub fn initial_frame(&self, max_locals: u16) -> Result<VerifierFrame, Error> {
        let mut locals: Vec<VType> = vec![];

        if !self.is_static {
            if self.name == "<init>" && self.class != BinaryName::OBJECT {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(RefType::Object(self.class.clone())));
            }
        }
        for parameter in &self.descriptor.parameters {
            let parameter = VType::from(parameter.clone());
            let width = parameter.width();
            locals.push(parameter);
            if width == 2 {
                locals.push(VerificationType::Top);
            }
        }

        if locals.len() > max_locals as usize {
            return Err(Error::VerifierError {
                offset: 0,
                instruction: String::from("method entry"),
                kind: VerifierErrorKind::InvalidIndex(max_locals),
            });
        }
        locals.resize(max_locals as usize, VerificationType::Top);

        Ok(VerifierFrame {
            locals,
            stack: OffsetVec::new(),
        })
    }
}

/// Maximal run of instructions with a single entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Offset of the first instruction
    pub start: u32,

    /// Offset right after the last instruction
    pub end: u32,

    /// Indices of the block's instructions in [`Analysis::instructions`]
    pub instructions: Range<usize>,
}

/// Exception handler, resolved to blocks and types
struct Handler {
    start: u32,
    end: u32,
    block: usize,
    catch_type: RefType<BinaryName>,
}

/// Result of type-checking a method body
#[derive(Debug)]
pub struct Analysis {
    pub instructions: Vec<DecodedInstruction>,
    pub blocks: Vec<BasicBlock>,

    /// Frame on entry to each block (`None` if the block is unreachable)
    pub entry_frames: Vec<Option<VerifierFrame>>,

    /// Offsets that need an explicit frame in the stack map table
    pub frame_targets: BTreeSet<u32>,

    pub initial_frame: VerifierFrame,

    /// Largest operand stack height seen, in slots
    pub max_stack: usize,
}

impl Analysis {
    /// Type-check a method body, computing the frame at the start of every basic block
    pub fn run(
        signature: &MethodSignature,
        code: &Code,
        constants: &ConstantsPool,
        class_graph: &ClassGraph,
    ) -> Result<Analysis, Error> {
        let code_len = code.code_array.0.len();
        let instructions = decode_code(&code.code_array.0)?;
        let instruction_starts: BTreeSet<u32> = instructions.iter().map(|i| i.offset).collect();

        for handler in &code.exception_table {
            let (start, end, handler_pc) = (
                handler.start_pc as u32,
                handler.end_pc as u32,
                handler.handler_pc as u32,
            );
            let bad_offset = if !instruction_starts.contains(&start) || start >= end {
                Some(start)
            } else if end as usize > code_len
                || (end as usize != code_len && !instruction_starts.contains(&end))
            {
                Some(end)
            } else if !instruction_starts.contains(&handler_pc) {
                Some(handler_pc)
            } else {
                None
            };
            if let Some(bad_offset) = bad_offset {
                return Err(Error::Decode {
                    offset: start,
                    kind: DecodeErrorKind::BadBranchTarget(bad_offset as i64),
                });
            }
        }

        // Block boundaries
        let mut leaders: BTreeSet<u32> = BTreeSet::new();
        let mut frame_targets: BTreeSet<u32> = BTreeSet::new();
        leaders.insert(0);
        for insn in &instructions {
            if let AnyInstruction::Branch(branch) = &insn.instruction {
                let targets = branch.jump_targets();
                leaders.extend(targets.iter().copied());
                frame_targets.extend(targets);
                if (insn.next_offset as usize) < code_len {
                    leaders.insert(insn.next_offset);
                    if !branch.falls_through() {
                        frame_targets.insert(insn.next_offset);
                    }
                }
            }
        }
        for handler in &code.exception_table {
            leaders.insert(handler.handler_pc as u32);
            frame_targets.insert(handler.handler_pc as u32);
        }

        let blocks = split_blocks(&instructions, &leaders, code_len as u32);
        let block_index: BTreeMap<u32, usize> = blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| (block.start, idx))
            .collect();
        debug!(
            "{} instructions in {} blocks",
            instructions.len(),
            blocks.len()
        );

        let mut handlers = vec![];
        for handler in &code.exception_table {
            let catch_type = match handler.catch_type {
                None => RefType::Object(BinaryName::THROWABLE),
                Some(class) => constants.class_type(class)?,
            };
            if !class_graph.is_assignable(&catch_type, &RefType::Object(BinaryName::THROWABLE)) {
                debug!("{} is not known to be throwable", catch_type.class_name());
            }
            handlers.push(Handler {
                start: handler.start_pc as u32,
                end: handler.end_pc as u32,
                block: block_index[&(handler.handler_pc as u32)],
                catch_type,
            });
        }

        let context = MethodContext {
            constants,
            this_class: RefType::Object(signature.class.clone()),
            return_type: signature.descriptor.return_type.clone(),
        };
        let initial_frame = signature.initial_frame(code.max_locals)?;

        let mut fixpoint = Fixpoint {
            entry_frames: vec![None; blocks.len()],
            worklist: BTreeSet::new(),
            blocks: &blocks,
            class_graph,
        };
        fixpoint.merge_into(0, initial_frame.clone())?;

        let mut max_stack = 0;
        loop {
            let block_idx = match fixpoint.worklist.iter().next() {
                Some(block_idx) => *block_idx,
                None => break,
            };
            fixpoint.worklist.remove(&block_idx);

            let block = &blocks[block_idx];
            let mut frame = match &fixpoint.entry_frames[block_idx] {
                Some(frame) => frame.clone(),
                None => continue,
            };
            trace!("checking block at {}: {:?}", block.start, frame);

            for insn in &instructions[block.instructions.clone()] {
                let locals_before = frame.locals.clone();
                max_stack = max_stack.max(frame.stack_height());

                let result = match &insn.instruction {
                    AnyInstruction::Straight(straight) => {
                        frame.verify_instruction(straight, insn.offset, &context)
                    }
                    AnyInstruction::Branch(branch) => {
                        frame.verify_branch_instruction(branch, &context)
                    }
                };
                result.map_err(|kind| Error::VerifierError {
                    offset: insn.offset,
                    instruction: describe_instruction(insn),
                    kind,
                })?;
                max_stack = max_stack.max(frame.stack_height());

                for handler in &handlers {
                    if handler.start <= insn.offset && insn.offset < handler.end {
                        max_stack = max_stack.max(1);
                        for locals in [&locals_before, &frame.locals] {
                            let incoming = VerifierFrame::handler_frame(
                                locals.clone(),
                                handler.catch_type.clone(),
                            );
                            fixpoint.merge_into(handler.block, incoming)?;
                        }
                    }
                }
            }

            // Successors
            let last = &instructions[block.instructions.end - 1];
            let mut successors = vec![];
            let falls_through = match &last.instruction {
                AnyInstruction::Straight(_) => true,
                AnyInstruction::Branch(branch) => {
                    successors.extend(branch.jump_targets());
                    branch.falls_through()
                }
            };
            if falls_through {
                if last.next_offset as usize >= code_len {
                    return Err(Error::VerifierError {
                        offset: last.offset,
                        instruction: describe_instruction(last),
                        kind: VerifierErrorKind::FallsOffEnd,
                    });
                }
                successors.push(last.next_offset);
            }
            for successor in successors {
                fixpoint.merge_into(block_index[&successor], frame.clone())?;
            }
        }

        let entry_frames = fixpoint.entry_frames;
        Ok(Analysis {
            instructions,
            blocks,
            entry_frames,
            frame_targets,
            initial_frame,
            max_stack,
        })
    }

    pub fn is_reachable(&self, block: usize) -> bool {
        self.entry_frames[block].is_some()
    }

    /// Offset ranges of the blocks that are never reached
    pub fn dead_blocks(&self) -> Vec<Range<u32>> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.is_reachable(*idx))
            .map(|(_, block)| block.start..block.end)
            .collect()
    }

    /// Frames for the stack map table, in increasing offset order
    ///
    /// Reachable blocks get their entry frame if they need one, and unreachable blocks always get
    /// the frame matching their `nop ... athrow` replacement.
    pub fn frames(&self) -> Vec<(u32, VerifierFrame)> {
        self.blocks
            .iter()
            .zip(self.entry_frames.iter())
            .filter_map(|(block, frame)| match frame {
                Some(frame) if self.frame_targets.contains(&block.start) => {
                    Some((block.start, frame.clone()))
                }
                Some(_) => None,
                None => Some((block.start, VerifierFrame::dead_code_frame())),
            })
            .collect()
    }
}

/// Entry frames and the blocks whose entry frame changed since they were last checked
struct Fixpoint<'a> {
    entry_frames: Vec<Option<VerifierFrame>>,

    /// Blocks left to check (lowest offset first)
    worklist: BTreeSet<usize>,

    blocks: &'a [BasicBlock],
    class_graph: &'a ClassGraph,
}

impl<'a> Fixpoint<'a> {
    fn merge_into(&mut self, block_idx: usize, incoming: VerifierFrame) -> Result<(), Error> {
        let updated = match &self.entry_frames[block_idx] {
            None => incoming,
            Some(existing) => {
                let merged =
                    existing.merge(&incoming, self.blocks[block_idx].start, self.class_graph)?;
                if &merged == existing {
                    return Ok(());
                }
                merged
            }
        };
        self.entry_frames[block_idx] = Some(updated);
        self.worklist.insert(block_idx);
        Ok(())
    }
}

fn split_blocks(
    instructions: &[DecodedInstruction],
    leaders: &BTreeSet<u32>,
    code_len: u32,
) -> Vec<BasicBlock> {
    let mut blocks = vec![];
    let mut first = 0;
    for (idx, insn) in instructions.iter().enumerate().skip(1) {
        if leaders.contains(&insn.offset) {
            blocks.push(BasicBlock {
                start: instructions[first].offset,
                end: insn.offset,
                instructions: first..idx,
            });
            first = idx;
        }
    }
    blocks.push(BasicBlock {
        start: instructions[first].offset,
        end: code_len,
        instructions: first..instructions.len(),
    });
    blocks
}

fn describe_instruction(insn: &DecodedInstruction) -> String {
    match &insn.instruction {
        AnyInstruction::Straight(straight) => format!("{:?}", straight),
        AnyInstruction::Branch(branch) => format!("{:?}", branch),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{BytecodeArray, ExceptionHandler};
    use crate::jvm::class_graph::ClassPath;
    use crate::jvm::descriptors::ParseDescriptor;
    use crate::jvm::Name;
    use VerificationType::*;

    fn signature(descriptor: &str, is_static: bool) -> MethodSignature {
        MethodSignature {
            class: BinaryName::from_str("com/acme/Foo").unwrap(),
            name: String::from("run"),
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
            is_static,
        }
    }

    fn code(max_locals: u16, bytes: &[u8], exception_table: Vec<ExceptionHandler>) -> Code {
        Code {
            max_stack: 4,
            max_locals,
            code_array: BytecodeArray(bytes.to_vec()),
            exception_table,
            attributes: vec![],
        }
    }

    fn analyze(signature: &MethodSignature, code: &Code) -> Result<Analysis, Error> {
        let constants = ConstantsPool::new();
        let graph = ClassGraph::new(ClassPath::empty());
        Analysis::run(signature, code, &constants, &graph)
    }

    #[test]
    fn initial_frames() {
        let instance = signature("(JLjava/lang/String;[I)V", false);
        let frame = instance.initial_frame(6).unwrap();
        let foo = Object(RefType::Object(BinaryName::from_str("com/acme/Foo").unwrap()));
        let string = Object(RefType::Object(BinaryName::STRING));
        let ints = Object(RefType::from_class_name("[I").unwrap());
        assert_eq!(frame.locals, vec![foo, Long, Top, string, ints, Top]);

        let mut constructor = signature("(D)V", false);
        constructor.name = String::from("<init>");
        let frame = constructor.initial_frame(3).unwrap();
        assert_eq!(frame.locals, vec![UninitializedThis, Double, Top]);

        let statik = signature("(IZ)I", true);
        assert!(matches!(
            statik.initial_frame(1),
            Err(Error::VerifierError {
                kind: VerifierErrorKind::InvalidIndex(1),
                ..
            })
        ));
    }

    #[test]
    fn loop_frames() {
        // static int count(int n) { int i = 0; while (i < n) i++; return i; }
        let bytes = [
            0x03, // 0: iconst_0
            0x3c, // 1: istore_1
            0x1b, // 2: iload_1
            0x1a, // 3: iload_0
            0xa2, 0x00, 0x09, // 4: if_icmpge 13
            0x84, 0x01, 0x01, // 7: iinc 1, 1
            0xa7, 0xff, 0xf8, // 10: goto 2
            0x1b, // 13: iload_1
            0xac, // 14: ireturn
        ];
        let analysis = analyze(&signature("(I)I", true), &code(2, &bytes, vec![])).unwrap();

        let starts: Vec<u32> = analysis.blocks.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0, 2, 7, 13]);
        assert_eq!(
            analysis.frame_targets.iter().copied().collect::<Vec<_>>(),
            vec![2, 13]
        );
        let frames = analysis.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, 2);
        assert_eq!(frames[0].1.locals, vec![Integer, Integer]);
        assert_eq!(frames[1].0, 13);
        assert_eq!(analysis.max_stack, 2);
        assert!(analysis.dead_blocks().is_empty());
    }

    #[test]
    fn dead_code_and_handlers() {
        // Handler around the first `return`, with unreachable code before the handler
        let bytes = [
            0xb1, // 0: return
            0x03, // 1: iconst_0 (dead)
            0x57, // 2: pop (dead)
            0x4b, // 3: astore_0 (handler)
            0xb1, // 4: return
        ];
        let handler = ExceptionHandler {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 3,
            catch_type: None,
        };
        let analysis = analyze(&signature("()V", true), &code(1, &bytes, vec![handler])).unwrap();

        assert_eq!(analysis.dead_blocks(), vec![1..3]);
        let frames = analysis.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], (1, VerifierFrame::dead_code_frame()));
        assert_eq!(
            frames[1].1.describe_stack(),
            vec![String::from("java/lang/Throwable")]
        );
        assert_eq!(frames[1].1.locals, vec![Top]);
    }

    #[test]
    fn falling_off_the_end() {
        let bytes = [0x03, 0x57]; // iconst_0, pop
        assert!(matches!(
            analyze(&signature("()V", true), &code(0, &bytes, vec![])),
            Err(Error::VerifierError {
                offset: 1,
                kind: VerifierErrorKind::FallsOffEnd,
                ..
            })
        ));
    }

    #[test]
    fn incompatible_stacks() {
        // Two paths reach offset 8: one with an int on the stack and one with a float
        let bytes = [
            0x03, // 0: iconst_0
            0x1a, // 1: iload_0
            0x99, 0x00, 0x06, // 2: ifeq 8
            0x57, // 5: pop
            0x0b, // 6: fconst_0
            0x00, // 7: nop
            0x57, // 8: pop
            0xb1, // 9: return
        ];
        let result = analyze(&signature("(I)V", true), &code(1, &bytes, vec![]));
        assert!(matches!(result, Err(Error::IncompatibleFrames { offset: 8, .. })));
    }

    #[test]
    fn type_errors_carry_the_instruction() {
        let bytes = [0x0b, 0x1a, 0x60, 0xb1]; // fconst_0, iload_0, iadd, return
        match analyze(&signature("(I)V", true), &code(1, &bytes, vec![])) {
            Err(Error::VerifierError {
                offset,
                instruction,
                kind,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(instruction, "IAdd");
                assert_eq!(kind, VerifierErrorKind::InvalidType);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bad_handler_ranges() {
        let handler = ExceptionHandler {
            start_pc: 0,
            end_pc: 7,
            handler_pc: 0,
            catch_type: None,
        };
        let result = analyze(&signature("()V", true), &code(0, &[0xb1], vec![handler]));
        assert!(matches!(
            result,
            Err(Error::Decode {
                kind: DecodeErrorKind::BadBranchTarget(7),
                ..
            })
        ));
    }
}
