use super::*;
use crate::jvm::class_file::{Code, ConstantsPool, ExceptionHandler, StackMapTable};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::Error;
use log::{debug, warn};
use std::ops::Range;

const NOP: u8 = 0x00;
const ATHROW: u8 = 0xbf;

/// What rebuilding the stack map of a method found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapSummary {
    /// Number of frames in the new `StackMapTable` (0 if the attribute was removed)
    pub frames: usize,

    /// Number of unreachable blocks that were replaced with `nop ... athrow`
    pub dead_blocks: usize,

    /// Largest operand stack height found, in slots
    pub max_stack: usize,
}

/// Recompute the `StackMapTable` of a method body in place
///
/// Unreachable code is overwritten with `nop`s and a final `athrow` (the usual trick to give dead
/// code a trivially valid frame), and exception table entries are trimmed so they only cover
/// reachable code. New class constants needed by the frames are added to `constants`.
///
/// `max_stack` is left alone, except that it is raised to 1 when unreachable code needs room for
/// the `Throwable` in its frame.
pub fn rebuild_stack_map(
    signature: &MethodSignature,
    code: &mut Code,
    constants: &mut ConstantsPool,
    class_graph: &ClassGraph,
) -> Result<StackMapSummary, Error> {
    let analysis = Analysis::run(signature, code, constants, class_graph)?;
    if analysis.max_stack > code.max_stack as usize {
        warn!(
            "{} needs a stack of {} but only declares {}",
            signature.name, analysis.max_stack, code.max_stack
        );
    }

    let dead_blocks = analysis.dead_blocks();
    for dead_block in &dead_blocks {
        debug!("replacing unreachable code at {:?}", dead_block);
        replace_dead_code(&mut code.code_array.0, dead_block);
    }

    // Frames of dead blocks hold the `Throwable` their `athrow` consumes
    let mut max_stack = analysis.max_stack;
    if !dead_blocks.is_empty() {
        max_stack = max_stack.max(1);
        if code.max_stack == 0 {
            debug!("raising max_stack of {} to 1 for unreachable code", signature.name);
            code.max_stack = 1;
        }
    }
    code.exception_table = trim_exception_table(&code.exception_table, &dead_blocks);

    let mut frames = vec![];
    let mut previous: Option<(u32, Frame<_, _>)> = None;
    for (offset, frame) in analysis.frames() {
        let frame = frame.into_serializable(constants)?;
        let stack_map_frame = match &previous {
            None => {
                let initial_frame = analysis.initial_frame.into_serializable(constants)?;
                frame.stack_map_frame(offset as u16, &initial_frame)
            }
            Some((previous_offset, previous_frame)) => {
                let offset_delta = (offset - previous_offset - 1) as u16;
                frame.stack_map_frame(offset_delta, previous_frame)
            }
        };
        frames.push(stack_map_frame);
        previous = Some((offset, frame));
    }

    let summary = StackMapSummary {
        frames: frames.len(),
        dead_blocks: dead_blocks.len(),
        max_stack,
    };
    if frames.is_empty() {
        code.set_stack_map_table(constants, None);
    } else {
        let table = constants.get_attribute(&StackMapTable(frames))?;
        code.set_stack_map_table(constants, Some(table));
    }

    Ok(summary)
}

/// Overwrite a range of code with `nop`s followed by one `athrow`
fn replace_dead_code(code_array: &mut [u8], dead_block: &Range<u32>) {
    let (start, end) = (dead_block.start as usize, dead_block.end as usize);
    if start >= end {
        return;
    }
    for byte in &mut code_array[start..end - 1] {
        *byte = NOP;
    }
    code_array[end - 1] = ATHROW;
}

/// Cut dead ranges out of every exception table entry
///
/// An entry covering both live and dead code may split into several entries (kept in the same
/// position in the table), and entries covering only dead code disappear.
fn trim_exception_table(
    exception_table: &[ExceptionHandler],
    dead_blocks: &[Range<u32>],
) -> Vec<ExceptionHandler> {
    let mut trimmed = vec![];
    for handler in exception_table {
        let mut live_start = handler.start_pc as u32;
        let end = handler.end_pc as u32;

        for dead_block in dead_blocks {
            if dead_block.end <= live_start || dead_block.start >= end {
                continue;
            }
            if dead_block.start > live_start {
                trimmed.push(ExceptionHandler {
                    start_pc: live_start as u16,
                    end_pc: dead_block.start as u16,
                    ..handler.clone()
                });
            }
            live_start = dead_block.end;
        }

        if live_start < end {
            trimmed.push(ExceptionHandler {
                start_pc: live_start as u16,
                end_pc: end as u16,
                ..handler.clone()
            });
        }
    }
    trimmed
}
