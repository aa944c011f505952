//! Classified exit behaviour of translated blocks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::il::{JumpKind, Statement, SuperBlock};

/// The classified control transfer terminating a translated block.
///
/// Addresses that a variant does not carry are structurally absent rather
/// than zeroed: a `Return` has no target, an unconditional `Jump` has no
/// fall-through. The flat accessors [`target`](Terminator::target),
/// [`fall_through`](Terminator::fall_through) and
/// [`is_tail`](Terminator::is_tail) read absent fields as `0` / `false`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Terminator {
    /// A direct call; `fall_through` is the instruction after the call.
    Call { target: u64, fall_through: u64 },
    /// An indirect call whose target is not a constant.
    CallUnresolved { fall_through: u64 },
    /// An unconditional jump. `is_tail` is set by tail-jump detection once
    /// the whole function is assembled.
    Jump { target: u64, is_tail: bool },
    /// A conditional jump: `target` taken, `fall_through` not taken.
    Jcc { target: u64, fall_through: u64 },
    /// A return instruction.
    Return,
    /// Sequential continuation into the next block.
    Fallthrough { fall_through: u64 },
    /// A call or jump to a function known never to return.
    NoReturn { target: u64, fall_through: u64 },
    /// The exit behaviour could not be determined.
    Unresolved,
}

impl Terminator {
    /// Classify the exit behaviour of a lifted super-block.
    ///
    /// `block_start` is the address of the block's first instruction; it
    /// bounds the check which suppresses false conditional exits produced
    /// when the lifter under-translates a long block.
    pub fn from_super_block(ir: &SuperBlock, block_start: u64) -> Terminator {
        let (last_addr, fall_through) = match ir.last_mark() {
            Some((address, length)) => (address, address + length),
            None => (0, 0),
        };

        let jmp_call_target = ir.next().if_constant().map_or(0, |constant| constant.value());

        // A constant next equal to the fall-through address is an ordinary
        // sequential successor, not a jump or call.
        let is_jmp_call = fall_through != jmp_call_target;

        let mut jcc_target = 0;
        let mut is_conditional = false;
        for statement in ir.statements().iter().rev() {
            if jcc_target != 0 {
                break;
            }
            match statement {
                // A conditional exit resides in the last source instruction
                // of the block; stop the scan at its mark.
                Statement::IMark { .. } => break,
                Statement::Exit { target, .. } => {
                    jcc_target = target.value();
                    is_conditional = true;

                    if jcc_target == jmp_call_target && fall_through == jcc_target {
                        jcc_target = 0;
                    }

                    // An exit pointing back into the block is an artifact
                    // of an under-translated long block, not a real jcc.
                    // The block start stays admissible: a loop may target
                    // it.
                    if jcc_target > block_start && jcc_target <= last_addr {
                        jcc_target = 0;
                        is_conditional = false;
                    }
                }
                _ => {}
            }
        }

        // The lifter's normal form can swap the roles of the two arms of a
        // conditional. If the exit targets our own fall-through, the real
        // taken target is in `next`.
        if is_conditional && is_jmp_call && jcc_target == fall_through {
            jcc_target = jmp_call_target;
        }

        match ir.jump_kind() {
            JumpKind::NoDecode => Terminator::Fallthrough {
                fall_through: jmp_call_target,
            },
            JumpKind::Return => Terminator::Return,
            JumpKind::Call => {
                if jmp_call_target != 0 {
                    Terminator::Call {
                        target: jmp_call_target,
                        fall_through,
                    }
                } else {
                    Terminator::CallUnresolved { fall_through }
                }
            }
            JumpKind::Boring => {
                if jcc_target != 0 {
                    Terminator::Jcc {
                        target: jcc_target,
                        fall_through,
                    }
                } else if jmp_call_target == last_addr {
                    // String instructions like rep movsq name their own
                    // last address as the jump target; that is a
                    // fall-through.
                    Terminator::Fallthrough { fall_through }
                } else if jmp_call_target != 0 {
                    // A target equal to the fall-through comes from an
                    // under-translated long block; the semantics match a
                    // fall-through but the jump label is preserved.
                    Terminator::Jump {
                        target: jmp_call_target,
                        is_tail: false,
                    }
                } else {
                    Terminator::Unresolved
                }
            }
            _ => Terminator::Unresolved,
        }
    }

    /// The branch or call target, or `0` if this terminator has none.
    pub fn target(&self) -> u64 {
        match self {
            Terminator::Call { target, .. }
            | Terminator::Jump { target, .. }
            | Terminator::Jcc { target, .. }
            | Terminator::NoReturn { target, .. } => *target,
            _ => 0,
        }
    }

    /// The address execution continues at when the terminator is not
    /// taken, or `0` if this terminator has none.
    pub fn fall_through(&self) -> u64 {
        match self {
            Terminator::Call { fall_through, .. }
            | Terminator::CallUnresolved { fall_through }
            | Terminator::Jcc { fall_through, .. }
            | Terminator::Fallthrough { fall_through }
            | Terminator::NoReturn { fall_through, .. } => *fall_through,
            _ => 0,
        }
    }

    /// Whether this terminator is a jump leaving its function.
    pub fn is_tail(&self) -> bool {
        match self {
            Terminator::Jump { is_tail, .. } => *is_tail,
            _ => false,
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Terminator::Call {
                target,
                fall_through,
            } => write!(f, "call 0x{:x} / 0x{:x}", target, fall_through),
            Terminator::CallUnresolved { fall_through } => {
                write!(f, "call ? / 0x{:x}", fall_through)
            }
            Terminator::Jump { target, is_tail } => {
                if *is_tail {
                    write!(f, "tail jump 0x{:x}", target)
                } else {
                    write!(f, "jump 0x{:x}", target)
                }
            }
            Terminator::Jcc {
                target,
                fall_through,
            } => write!(f, "jcc 0x{:x} / 0x{:x}", target, fall_through),
            Terminator::Return => write!(f, "return"),
            Terminator::Fallthrough { fall_through } => {
                write!(f, "fall through 0x{:x}", fall_through)
            }
            Terminator::NoReturn { target, .. } => write!(f, "no-return 0x{:x}", target),
            Terminator::Unresolved => write!(f, "unresolved"),
        }
    }
}
