//! A `SuperBlock` is the lifter's IR for a (possibly partial) basic block.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::il::{Constant, Expression, Statement};

/// The kind of control transfer terminating a super-block.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum JumpKind {
    /// An ordinary transfer: a jump, a conditional jump, or a sequential
    /// continuation into the next block.
    Boring,
    /// A call instruction.
    Call,
    /// A return instruction.
    Return,
    /// The lifter stopped before a control-flow instruction was reached.
    NoDecode,
    /// A system call.
    Syscall,
}

impl fmt::Display for JumpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JumpKind::Boring => write!(f, "boring"),
            JumpKind::Call => write!(f, "call"),
            JumpKind::Return => write!(f, "return"),
            JumpKind::NoDecode => write!(f, "no-decode"),
            JumpKind::Syscall => write!(f, "syscall"),
        }
    }
}

/// An ordered sequence of statements lifted from one block of machine code,
/// together with the terminating jump kind and the `next` expression.
///
/// A super-block covers whole source instructions; each begins with a
/// `Statement::IMark`. The lifter may cover fewer or more instructions than
/// a disassembler-declared block; the translation core reconciles both
/// cases.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SuperBlock {
    statements: Vec<Statement>,
    jump_kind: JumpKind,
    next: Expression,
}

impl SuperBlock {
    /// Create a new, empty `SuperBlock` with the given jump kind and `next`
    /// expression.
    pub fn new(jump_kind: JumpKind, next: Expression) -> SuperBlock {
        SuperBlock {
            statements: Vec::new(),
            jump_kind,
            next,
        }
    }

    /// Append a statement to this `SuperBlock`.
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Get the statements of this `SuperBlock`.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Get the jump kind terminating this `SuperBlock`.
    pub fn jump_kind(&self) -> JumpKind {
        self.jump_kind
    }

    /// Get the `next` expression of this `SuperBlock`.
    pub fn next(&self) -> &Expression {
        &self.next
    }

    /// Count the source instructions covered by this `SuperBlock`.
    pub fn instruction_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|statement| statement.is_imark())
            .count()
    }

    /// Get the address and length of the last source instruction, or `None`
    /// if this `SuperBlock` contains no instruction mark.
    pub fn last_mark(&self) -> Option<(u64, u64)> {
        self.statements.iter().rev().find_map(|statement| {
            if let Statement::IMark { address, length } = statement {
                Some((*address, *length))
            } else {
                None
            }
        })
    }

    /// Truncate this `SuperBlock` after `count` source instructions.
    ///
    /// Statements from the `count + 1`-th instruction mark onwards are
    /// dropped, the jump kind becomes `NoDecode`, and `next` is rewritten
    /// to the constant address of the first instruction beyond the cut. A
    /// super-block covering `count` or fewer instructions is left
    /// untouched.
    pub fn truncate_after_instructions(&mut self, count: usize) {
        let mut instruction_counter = count + 1;
        for i in 0..self.statements.len() {
            if let Statement::IMark { address, .. } = self.statements[i] {
                instruction_counter -= 1;
                if instruction_counter == 0 {
                    self.statements.truncate(i);
                    self.jump_kind = JumpKind::NoDecode;
                    self.next = Expression::constant(Constant::new(address, 64));
                    break;
                }
            }
        }
    }
}

impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        write!(f, "goto {} [{}]", self.next, self.jump_kind)
    }
}
