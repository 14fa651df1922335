use super::*;
use crate::jvm::class_file::{
    ClassConstantIndex, Constant, ConstantIndex, ConstantsPool, StackMapFrame,
};
use crate::jvm::class_graph::{ClassGraph, UnknownClass};
use crate::jvm::code::{BranchInstruction, Instruction, InvokeType};
use crate::jvm::descriptors::ParseDescriptor;
use crate::jvm::{BinaryName, Error, FieldType, MethodDescriptor, RefType, VerifierErrorKind};
use crate::util::{OffsetVec, Width};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// This is the shape frames have in a `StackMapTable`: one entry per local variable, where a
/// `long` or `double` is a single entry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

/// Frame tracked during analysis
///
/// Locals are kept one per slot (so a `long` in slot 3 is followed by `Top` in slot 4) since that
/// is how instructions address them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerifierFrame {
    /// Local variable slots, always `max_locals` long (except in frames for dead code)
    pub locals: Vec<VType>,

    /// Types of values on the stack
    pub stack: OffsetVec<VType>,
}

/// What the transfer functions need to know about the method being analyzed
pub struct MethodContext<'a> {
    pub constants: &'a ConstantsPool,

    /// Class declaring the method (what `uninitializedThis` becomes after `<init>`)
    pub this_class: RefType<BinaryName>,

    /// Return type of the method (`None` for `void`)
    pub return_type: Option<FieldType<BinaryName>>,
}

impl VerifierFrame {
    /// Frame found at the start of an exception handler
    pub fn handler_frame(locals: Vec<VType>, exception: RefType<BinaryName>) -> VerifierFrame {
        VerifierFrame {
            locals,
            stack: OffsetVec::from([VerificationType::Object(exception)]),
        }
    }

    /// Frame given to unreachable code once it has been replaced by `nop ... athrow`
    pub fn dead_code_frame() -> VerifierFrame {
        VerifierFrame::handler_frame(vec![], RefType::Object(BinaryName::THROWABLE))
    }

    /// Merge an incoming frame into this one
    ///
    /// Local variables that disagree become `Top`, but operand stacks must line up exactly.
    pub fn merge(
        &self,
        incoming: &VerifierFrame,
        offset: u32,
        class_graph: &ClassGraph,
    ) -> Result<VerifierFrame, Error> {
        let incompatible = || Error::IncompatibleFrames {
            offset,
            existing_stack: self.describe_stack(),
            incoming_stack: incoming.describe_stack(),
        };

        let unknown = |UnknownClass(class)| Error::UnknownClass { offset, class };

        if self.stack.len() != incoming.stack.len() {
            return Err(incompatible());
        }
        let mut stack = OffsetVec::new();
        for ((_, _, existing), (_, _, other)) in self.stack.iter().zip(incoming.stack.iter()) {
            match existing.merge(other, class_graph).map_err(unknown)? {
                Some(merged) => {
                    stack.push(merged);
                }
                None => return Err(incompatible()),
            }
        }

        let locals = self
            .locals
            .iter()
            .zip(incoming.locals.iter())
            .map(|(existing, other)| existing.merge_local(other, class_graph).map_err(unknown))
            .collect::<Result<Vec<VType>, Error>>()?;

        Ok(VerifierFrame { locals, stack })
    }

    pub fn describe_stack(&self) -> Vec<String> {
        self.stack.iter().map(|(_, _, t)| t.describe()).collect()
    }

    /// Height of the operand stack in slots
    pub fn stack_height(&self) -> usize {
        self.stack.offset_len().0
    }

    /// Resolve the frame into its serializable form
    ///
    /// The slot after a `long` or `double` is implied by the entry itself, and trailing `Top`
    /// locals are dropped.
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<Frame<ClassConstantIndex, u16>, Error> {
        let mut entries: Vec<&VType> = vec![];
        let mut slot = 0;
        while slot < self.locals.len() {
            let local = &self.locals[slot];
            entries.push(local);
            slot += local.width();
        }
        while let Some(VerificationType::Top) = entries.last() {
            entries.pop();
        }

        let mut locals = OffsetVec::new();
        for local in entries {
            locals.push(local.into_serializable(constants)?);
        }
        let mut stack = OffsetVec::new();
        for (_, _, typ) in self.stack.iter() {
            stack.push(typ.into_serializable(constants)?);
        }
        Ok(Frame { locals, stack })
    }

    /// Update the frame to reflect the effects of the given (non-branching) instruction
    pub fn verify_instruction(
        &mut self,
        insn: &Instruction,
        insn_offset: u32,
        context: &MethodContext,
    ) -> Result<(), VerifierErrorKind> {
        verify_instruction(self, insn, insn_offset, context)
    }

    /// Update the frame to reflect the effects of the given branching instruction
    pub fn verify_branch_instruction(
        &mut self,
        insn: &BranchInstruction,
        context: &MethodContext,
    ) -> Result<(), VerifierErrorKind> {
        verify_branch_instruction(self, insn, context)
    }
}

impl Frame<ClassConstantIndex, u16> {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();
                let common_prefix = self
                    .locals
                    .iter()
                    .zip(previous_frame.locals.iter())
                    .all(|((_, _, t1), (_, _, t2))| t1 == t2);

                if common_prefix && this_locals_len <= prev_locals_len {
                    match prev_locals_len - this_locals_len {
                        0 => return StackMapFrame::SameLocalsNoStack { offset_delta },
                        chopped_k @ 1..=3 => {
                            return StackMapFrame::ChopLocalsNoStack {
                                offset_delta,
                                chopped_k: chopped_k as u8,
                            }
                        }
                        _ => (),
                    }
                } else if common_prefix && this_locals_len - prev_locals_len < 4 {
                    return StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: self
                            .locals
                            .iter()
                            .skip(prev_locals_len)
                            .map(|(_, _, t)| *t)
                            .collect(),
                    };
                }
            }
            1 if self.locals == previous_frame.locals => {
                if let Some(stack) = self.stack.last() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: *stack,
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.iter().map(|(_, _, t)| *t).collect(),
            locals: self.locals.iter().map(|(_, _, t)| *t).collect(),
        }
    }
}

fn verify_instruction(
    frame: &mut VerifierFrame,
    insn: &Instruction,
    insn_offset: u32,
    context: &MethodContext,
) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use VerificationType::*;

    let VerifierFrame {
        ref mut stack,
        ref mut locals,
    } = frame;

    match insn {
        Nop => (),
        AConstNull => {
            stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            stack.push(Integer);
        }
        LConst0 | LConst1 => {
            stack.push(Long);
        }
        FConst0 | FConst1 | FConst2 => {
            stack.push(Float);
        }
        DConst0 | DConst1 => {
            stack.push(Double);
        }
        BiPush(_) | SiPush(_) => {
            stack.push(Integer);
        }
        Ldc(constant) => {
            let typ = constant_type(context.constants, *constant)?;
            if typ.width() != 1 {
                return Err(VerifierErrorKind::InvalidWidth(typ.width()));
            }
            stack.push(typ);
        }
        Ldc2(constant) => {
            let typ = constant_type(context.constants, *constant)?;
            if typ.width() != 2 {
                return Err(VerifierErrorKind::InvalidWidth(typ.width()));
            }
            stack.push(typ);
        }

        ILoad(index) => {
            get_local_expecting_type(locals, *index, &Integer)?;
            stack.push(Integer);
        }
        LLoad(index) => {
            get_local_expecting_type(locals, *index, &Long)?;
            stack.push(Long);
        }
        FLoad(index) => {
            get_local_expecting_type(locals, *index, &Float)?;
            stack.push(Float);
        }
        DLoad(index) => {
            get_local_expecting_type(locals, *index, &Double)?;
            stack.push(Double);
        }
        ALoad(index) => {
            let typ = get_local(locals, *index)?;
            if !typ.is_reference() {
                return Err(VerifierErrorKind::InvalidType);
            }
            stack.push(typ.clone());
        }

        IALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::int())?;
            stack.push(Integer);
        }
        LALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::long())?;
            stack.push(Long);
        }
        FALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::float())?;
            stack.push(Float);
        }
        DALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::double())?;
            stack.push(Double);
        }
        AALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            match pop_array(stack, |elem| matches!(elem, FieldType::Ref(_)))? {
                // Loading out of a `null` array always throws, so any reference will do
                None => stack.push(Null),
                Some(elem) => stack.push(VType::from(elem)),
            };
        }
        BALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| {
                elem == &FieldType::byte() || elem == &FieldType::boolean()
            })?;
            stack.push(Integer);
        }
        CALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::char())?;
            stack.push(Integer);
        }
        SALoad => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::short())?;
            stack.push(Integer);
        }

        IStore(index) => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            update_local_type(locals, *index, Integer)?;
        }
        FStore(index) => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            update_local_type(locals, *index, Float)?;
        }
        LStore(index) => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            update_local_type(locals, *index, Long)?;
        }
        DStore(index) => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            update_local_type(locals, *index, Double)?;
        }
        AStore(index) => {
            let popped_type = pop_reference(stack)?;
            update_local_type(locals, *index, popped_type)?;
        }

        IAStore => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::int())?;
        }
        LAStore => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::long())?;
        }
        FAStore => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::float())?;
        }
        DAStore => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::double())?;
        }
        AAStore => {
            pop_reference(stack)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| matches!(elem, FieldType::Ref(_)))?;
        }
        BAStore => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| {
                elem == &FieldType::byte() || elem == &FieldType::boolean()
            })?;
        }
        CAStore => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::char())?;
        }
        SAStore => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_array(stack, |elem| elem == &FieldType::short())?;
        }

        Pop => {
            let _ = pop_offset_vec_expecting_width(stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop_offset_vec(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let _ = pop_offset_vec_expecting_width(stack, 1)?;
                }

                // Form 2
                2 => (),

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg1);
        }

        DupX1 => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg2);
            stack.push(arg1);
        }

        DupX2 => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec(stack)?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2 => {
            let arg1 = pop_offset_vec(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    stack.push(arg1.clone());
                    stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X1 => {
            let arg1 = pop_offset_vec(stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                    let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg3);
                    stack.push(arg2);
                    stack.push(arg1);
                }

                // Form 2
                2 => {
                    let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg2);
                    stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X2 => {
            let arg1 = pop_offset_vec(stack)?;
            match arg1.width() {
                1 => {
                    let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                    let arg3 = pop_offset_vec(stack)?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = pop_offset_vec_expecting_width(stack, 1)?;
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg4);
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 3
                        2 => {
                            stack.push(arg2.clone());
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                2 => {
                    let arg2 = pop_offset_vec(stack)?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                            stack.push(arg1.clone());
                            stack.push(arg3);
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        // Form 4
                        2 => {
                            stack.push(arg1.clone());
                            stack.push(arg2);
                            stack.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Swap => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1);
            stack.push(arg2);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Integer);
        }

        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Long);
        }

        FAdd | FSub | FDiv | FMul | FRem => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Float);
        }

        DAdd | DSub | DDiv | DMul | DRem => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Double);
        }

        INeg | I2B | I2C | I2S => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Integer);
        }

        LNeg => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Long);
        }

        FNeg => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Float);
        }

        DNeg => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Double);
        }

        LSh(_) => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Long);
        }

        IInc(index, _) => {
            get_local_expecting_type(locals, *index, &Integer)?;
        }

        I2L => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Long);
        }
        I2F => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Float);
        }
        I2D => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Double);
        }

        L2I => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Integer);
        }
        L2F => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Float);
        }
        L2D => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Double);
        }

        F2I => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Integer);
        }
        F2L => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Long);
        }
        F2D => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Double);
        }

        D2I => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Integer);
        }
        D2L => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Long);
        }
        D2F => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Float);
        }

        LCmp => {
            pop_offset_vec_expecting_type(stack, &Long)?;
            pop_offset_vec_expecting_type(stack, &Long)?;
            stack.push(Integer);
        }
        FCmp(_) => {
            pop_offset_vec_expecting_type(stack, &Float)?;
            pop_offset_vec_expecting_type(stack, &Float)?;
            stack.push(Integer);
        }
        DCmp(_) => {
            pop_offset_vec_expecting_type(stack, &Double)?;
            pop_offset_vec_expecting_type(stack, &Double)?;
            stack.push(Integer);
        }

        GetStatic(field) => {
            let field_type = resolve_field_type(context.constants, field.0)?;
            stack.push(VType::from(field_type));
        }
        PutStatic(field) => {
            let field_type = resolve_field_type(context.constants, field.0)?;
            pop_expecting_field_type(stack, field_type)?;
        }
        GetField(field) => {
            let field_type = resolve_field_type(context.constants, field.0)?;
            pop_reference(stack)?;
            stack.push(VType::from(field_type));
        }
        PutField(field) => {
            let field_type = resolve_field_type(context.constants, field.0)?;
            pop_expecting_field_type(stack, field_type)?;
            // Fields of `this` may be assigned before the superclass constructor runs
            pop_reference(stack)?;
        }

        Invoke(invoke_type, method) => {
            let (name, desc) = resolve_method(context.constants, method.0)?;
            for parameter in desc.parameters.iter().rev() {
                pop_expecting_field_type(stack, parameter.clone())?;
            }

            if let (InvokeType::Special, true) = (invoke_type, name == "<init>") {
                if desc.return_type.is_some() {
                    return Err(VerifierErrorKind::InvalidType);
                }

                // Initialize
                match pop_offset_vec(stack)? {
                    UninitializedThis => {
                        let initialized = Object(context.this_class.clone());
                        replace_all(stack, &UninitializedThis, &initialized);
                        replace_all_locals(locals, &UninitializedThis, &initialized);
                    }

                    uninitialized @ Uninitialized(_) => {
                        let initialized = match &uninitialized {
                            Uninitialized(uninitialized_ref) => {
                                Object(uninitialized_ref.class.clone())
                            }
                            _ => return Err(VerifierErrorKind::InvalidType),
                        };
                        replace_all(stack, &uninitialized, &initialized);
                        replace_all_locals(locals, &uninitialized, &initialized);
                    }

                    _ => return Err(VerifierErrorKind::InvalidType),
                }
            } else {
                if *invoke_type != InvokeType::Static {
                    pop_reference(stack)?;
                }
                if let Some(return_type) = desc.return_type {
                    stack.push(VType::from(return_type));
                }
            }
        }

        InvokeDynamic(call_site) => {
            let desc = resolve_call_site(context.constants, *call_site)?;
            for parameter in desc.parameters.iter().rev() {
                pop_expecting_field_type(stack, parameter.clone())?;
            }
            if let Some(return_type) = desc.return_type {
                stack.push(VType::from(return_type));
            }
        }

        New(class) => {
            let class_type = resolve_class(context.constants, *class)?;
            if class_type.is_array() {
                return Err(VerifierErrorKind::InvalidType);
            }
            stack.push(Uninitialized(UninitializedRef {
                new_offset: insn_offset as u16,
                class: class_type,
            }));
        }
        NewArray(base_type) => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Object(RefType::array(FieldType::Base(*base_type))));
        }
        ANewArray(class) => {
            let element_type = resolve_class(context.constants, *class)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
            stack.push(Object(RefType::array(FieldType::Ref(element_type))));
        }
        MultiANewArray(class, dimensions) => {
            let array_type = resolve_class(context.constants, *class)?;
            if *dimensions == 0 || !array_type.is_array() {
                return Err(VerifierErrorKind::NotArrayType);
            }
            for _ in 0..*dimensions {
                pop_offset_vec_expecting_type(stack, &Integer)?;
            }
            stack.push(Object(array_type));
        }
        ArrayLength => {
            pop_array(stack, |_| true)?;
            stack.push(Integer);
        }

        CheckCast(class) => {
            let class_type = resolve_class(context.constants, *class)?;
            pop_reference(stack)?;
            stack.push(Object(class_type));
        }
        InstanceOf(class) => {
            resolve_class(context.constants, *class)?;
            pop_reference(stack)?;
            stack.push(Integer);
        }

        MonitorEnter | MonitorExit => {
            pop_reference(stack)?;
        }
    }

    Ok(())
}

fn verify_branch_instruction(
    frame: &mut VerifierFrame,
    insn: &BranchInstruction,
    context: &MethodContext,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use VerificationType::*;

    let VerifierFrame {
        ref mut stack,
        locals: _,
    } = frame;

    let return_type = context.return_type.as_ref().map(|ret| VType::from(ret.clone()));

    match insn {
        If(_, _) => pop_offset_vec_expecting_type(stack, &Integer)?,
        IfICmp(_, _) => {
            pop_offset_vec_expecting_type(stack, &Integer)?;
            pop_offset_vec_expecting_type(stack, &Integer)?;
        }
        IfACmp(_, _) => {
            pop_reference(stack)?;
            pop_reference(stack)?;
        }
        IfNull(_, _) => {
            pop_reference(stack)?;
        }
        Goto(_) => (),
        TableSwitch { .. } | LookupSwitch { .. } => {
            pop_offset_vec_expecting_type(stack, &Integer)?
        }
        IReturn | LReturn | FReturn | DReturn => {
            let expected = match insn {
                IReturn => Integer,
                LReturn => Long,
                FReturn => Float,
                _ => Double,
            };
            pop_offset_vec_expecting_type(stack, &expected)?;
            if return_type != Some(expected) {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        AReturn => {
            pop_reference(stack)?;
            if !matches!(return_type, Some(Object(_))) {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        Return => {
            if return_type.is_some() {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        AThrow => {
            let exception = pop_reference(stack)?;
            stack.clear();
            stack.push(exception);
        }
    }

    Ok(())
}

/// Type of the value `ldc`, `ldc_w`, or `ldc2_w` pushes
fn constant_type(
    constants: &ConstantsPool,
    index: ConstantIndex,
) -> Result<VType, VerifierErrorKind> {
    let object = |name: BinaryName| VerificationType::Object(RefType::Object(name));
    match constants.get(index) {
        Some(Constant::Integer(_)) => Ok(VerificationType::Integer),
        Some(Constant::Float(_)) => Ok(VerificationType::Float),
        Some(Constant::Long(_)) => Ok(VerificationType::Long),
        Some(Constant::Double(_)) => Ok(VerificationType::Double),
        Some(Constant::String(_)) => Ok(object(BinaryName::STRING)),
        Some(Constant::Class(_)) => Ok(object(BinaryName::CLASS)),
        Some(Constant::MethodType { .. }) => Ok(object(BinaryName::METHODTYPE)),
        Some(Constant::MethodHandle { .. }) => Ok(object(BinaryName::METHODHANDLE)),
        Some(Constant::Dynamic { name_and_type, .. }) => {
            let (_, descriptor) = constants
                .name_and_type(*name_and_type)
                .map_err(|_| VerifierErrorKind::BadConstant(index.0))?;
            let field_type = FieldType::parse(&descriptor)
                .map_err(|_| VerifierErrorKind::BadDescriptor(descriptor))?;
            Ok(VType::from(field_type))
        }
        _ => Err(VerifierErrorKind::BadConstant(index.0)),
    }
}

fn resolve_class(
    constants: &ConstantsPool,
    index: ClassConstantIndex,
) -> Result<RefType<BinaryName>, VerifierErrorKind> {
    constants
        .class_type(index)
        .map_err(|_| VerifierErrorKind::BadConstant((index.0).0))
}

fn resolve_field_type(
    constants: &ConstantsPool,
    index: ConstantIndex,
) -> Result<FieldType<BinaryName>, VerifierErrorKind> {
    let (_, _, descriptor) = constants
        .member_ref(index)
        .map_err(|_| VerifierErrorKind::BadConstant(index.0))?;
    FieldType::parse(&descriptor).map_err(|_| VerifierErrorKind::BadDescriptor(descriptor))
}

fn resolve_method(
    constants: &ConstantsPool,
    index: ConstantIndex,
) -> Result<(String, MethodDescriptor<BinaryName>), VerifierErrorKind> {
    let (_, name, descriptor) = constants
        .member_ref(index)
        .map_err(|_| VerifierErrorKind::BadConstant(index.0))?;
    let descriptor = MethodDescriptor::parse(&descriptor)
        .map_err(|_| VerifierErrorKind::BadDescriptor(descriptor))?;
    Ok((name, descriptor))
}

fn resolve_call_site(
    constants: &ConstantsPool,
    index: ConstantIndex,
) -> Result<MethodDescriptor<BinaryName>, VerifierErrorKind> {
    let name_and_type = match constants.get(index) {
        Some(Constant::InvokeDynamic {
            method_descriptor, ..
        }) => *method_descriptor,
        _ => return Err(VerifierErrorKind::BadConstant(index.0)),
    };
    let (_, descriptor) = constants
        .name_and_type(name_and_type)
        .map_err(|_| VerifierErrorKind::BadConstant(index.0))?;
    MethodDescriptor::parse(&descriptor).map_err(|_| VerifierErrorKind::BadDescriptor(descriptor))
}

fn replace_all(offset_vec: &mut OffsetVec<VType>, original: &VType, updated: &VType) {
    let mut replaced: OffsetVec<VType> = std::mem::take(offset_vec)
        .into_iter()
        .map(|(_, _, ty)| if ty == *original { updated.clone() } else { ty })
        .collect();

    std::mem::swap(offset_vec, &mut replaced);
}

fn replace_all_locals(locals: &mut [VType], original: &VType, updated: &VType) {
    for local in locals.iter_mut().filter(|local| *local == original) {
        *local = updated.clone();
    }
}

fn get_local(locals: &[VType], index: u16) -> Result<&VType, VerifierErrorKind> {
    locals
        .get(index as usize)
        .ok_or(VerifierErrorKind::InvalidIndex(index))
}

fn get_local_expecting_type(
    locals: &[VType],
    index: u16,
    expected_type: &VType,
) -> Result<(), VerifierErrorKind> {
    if get_local(locals, index)? == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

/// Store a type into a local, clobbering any `long`/`double` that overlaps it
fn update_local_type(
    locals: &mut [VType],
    index: u16,
    new_type: VType,
) -> Result<(), VerifierErrorKind> {
    let slot = index as usize;
    let width = new_type.width();
    if slot + width > locals.len() {
        return Err(VerifierErrorKind::InvalidIndex(index));
    }
    if slot > 0 && locals[slot - 1].width() == 2 {
        locals[slot - 1] = VerificationType::Top;
    }
    locals[slot] = new_type;
    if width == 2 {
        locals[slot + 1] = VerificationType::Top;
    }
    Ok(())
}

fn pop_offset_vec(stack: &mut OffsetVec<VType>) -> Result<VType, VerifierErrorKind> {
    stack
        .pop()
        .map(|(_, _, typ)| typ)
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_offset_vec_expecting_width(
    stack: &mut OffsetVec<VType>,
    expected_width: usize,
) -> Result<VType, VerifierErrorKind> {
    let typ = pop_offset_vec(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

fn pop_offset_vec_expecting_type(
    stack: &mut OffsetVec<VType>,
    expected_type: &VType,
) -> Result<(), VerifierErrorKind> {
    let typ = pop_offset_vec(stack)?;
    if typ == *expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

fn pop_reference(stack: &mut OffsetVec<VType>) -> Result<VType, VerifierErrorKind> {
    let typ = pop_offset_vec(stack)?;
    if typ.is_reference() {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

/// Pop a value that is going to be used as the given field type
///
/// References are only checked to be references: the classes involved need not be loadable.
fn pop_expecting_field_type(
    stack: &mut OffsetVec<VType>,
    field_type: FieldType<BinaryName>,
) -> Result<(), VerifierErrorKind> {
    match VType::from(field_type) {
        VerificationType::Object(_) => pop_reference(stack).map(|_| ()),
        primitive => pop_offset_vec_expecting_type(stack, &primitive),
    }
}

/// Pop an array (or `null`) whose element type satisfies `element_ok`
///
/// Returns the element type, or `None` if the array was `null`.
fn pop_array(
    stack: &mut OffsetVec<VType>,
    element_ok: impl Fn(&FieldType<BinaryName>) -> bool,
) -> Result<Option<FieldType<BinaryName>>, VerifierErrorKind> {
    match pop_offset_vec(stack)? {
        VerificationType::Null => Ok(None),
        VerificationType::Object(ref_type) => match ref_type.component_type() {
            Some(element) if element_ok(&element) => Ok(Some(element)),
            Some(_) => Err(VerifierErrorKind::InvalidType),
            None => Err(VerifierErrorKind::NotArrayType),
        },
        _ => Err(VerifierErrorKind::NotArrayType),
    }
}
