//! A `Statement` applies the semantics of one step of a source instruction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::il::{Constant, Expression, Scalar};

/// An IR statement inside a super-block.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Statement {
    /// Marks the boundary of a source instruction with its machine address
    /// and byte length. Every statement up to the next mark belongs to this
    /// instruction.
    IMark { address: u64, length: u64 },
    /// Assign the value given in expression to the variable indicated.
    Assign { dst: Scalar, src: Expression },
    /// Store the value in `src` at the address given in `index`.
    Store { index: Expression, src: Expression },
    /// Conditionally exit the block towards `target`.
    Exit {
        condition: Expression,
        target: Constant,
    },
}

impl Statement {
    /// Create a new `Statement::IMark`.
    pub fn imark(address: u64, length: u64) -> Statement {
        Statement::IMark { address, length }
    }

    /// Create a new `Statement::Assign`.
    pub fn assign(dst: Scalar, src: Expression) -> Statement {
        Statement::Assign { dst, src }
    }

    /// Create a new `Statement::Store`.
    pub fn store(index: Expression, src: Expression) -> Statement {
        Statement::Store { index, src }
    }

    /// Create a new `Statement::Exit`.
    pub fn exit(condition: Expression, target: Constant) -> Statement {
        Statement::Exit { condition, target }
    }

    /// Returns `true` if this `Statement` is an instruction mark.
    pub fn is_imark(&self) -> bool {
        match self {
            Statement::IMark { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this `Statement` is a conditional exit.
    pub fn is_exit(&self) -> bool {
        match self {
            Statement::Exit { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::IMark { address, length } => {
                write!(f, "imark(0x{:X}, {})", address, length)
            }
            Statement::Assign { dst, src } => write!(f, "{} = {}", dst, src),
            Statement::Store { index, src } => write!(f, "[{}] = {}", index, src),
            Statement::Exit { condition, target } => {
                write!(f, "if {} goto {}", condition, target)
            }
        }
    }
}
