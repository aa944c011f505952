//! The intermediate representation consumed by the translation core.
//!
//! Lifters hand the core one [`SuperBlock`] per lift request: an ordered
//! sequence of [`Statement`], a [`JumpKind`] describing the terminating
//! control transfer, and a `next` [`Expression`] which, when constant,
//! names the fall-through or branch address. Instruction boundaries are
//! marked by `Statement::IMark` entries carrying the machine address and
//! byte length of each source instruction.
//!
//! The types here form an owned tree. Lifter output is scratch-allocated
//! and must be cloned into this representation before the next lift call;
//! see [`crate::translator::Lifter`].

pub mod constant;
pub mod expression;
pub mod scalar;
pub mod statement;
pub mod superblock;

pub use self::constant::*;
pub use self::expression::*;
pub use self::scalar::*;
pub use self::statement::*;
pub use self::superblock::*;

/// A convenience function to create a new constant.
///
/// This is the preferred way to create a `Constant`.
pub fn const_(value: u64, bits: usize) -> Constant {
    Constant::new(value, bits)
}

/// A convenience function to create a new expression constant.
///
/// This is the preferred way to create an `Expression::Constant`.
pub fn expr_const(value: u64, bits: usize) -> Expression {
    Expression::constant(Constant::new(value, bits))
}

/// A convenience function to create a new scalar.
///
/// This is the preferred way to create a `Scalar`.
pub fn scalar<S>(name: S, bits: usize) -> Scalar
where
    S: Into<String>,
{
    Scalar::new(name, bits)
}

/// A convenience function to create a new expression scalar.
///
/// This is the preferred way to create an `Expression::Scalar`.
pub fn expr_scalar<S>(name: S, bits: usize) -> Expression
where
    S: Into<String>,
{
    Expression::scalar(Scalar::new(name, bits))
}
