//! An `Expression` evaluates to a value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::*;
use crate::il::{Constant, Scalar};

/// An IR expression.
///
/// The translation core only ever inspects the constant case (a constant
/// `next` expression names a branch or fall-through address); everything
/// else is carried through opaquely for downstream analyses.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Constant(Constant),
    Scalar(Scalar),

    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Create a new `Expression` from a `Constant`.
    pub fn constant(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }

    /// Create a new `Expression` from a `Scalar`.
    pub fn scalar(scalar: Scalar) -> Expression {
        Expression::Scalar(scalar)
    }

    /// Create an addition over `lhs` and `rhs`.
    pub fn add(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort(&lhs, &rhs)?;
        Ok(Expression::Add(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a subtraction of `rhs` from `lhs`.
    pub fn sub(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort(&lhs, &rhs)?;
        Ok(Expression::Sub(Box::new(lhs), Box::new(rhs)))
    }

    fn ensure_sort(lhs: &Expression, rhs: &Expression) -> Result<()> {
        if lhs.bits() != rhs.bits() {
            Err(ErrorKind::Sort.into())
        } else {
            Ok(())
        }
    }

    /// Return the bit-sort of this expression.
    pub fn bits(&self) -> usize {
        match self {
            Expression::Constant(constant) => constant.bits(),
            Expression::Scalar(scalar) => scalar.bits(),
            Expression::Add(lhs, _) | Expression::Sub(lhs, _) => lhs.bits(),
        }
    }

    /// If this expression is a constant, return the constant.
    pub fn if_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Constant(constant) => constant.fmt(f),
            Expression::Scalar(scalar) => scalar.fmt(f),
            Expression::Add(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            Expression::Sub(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
        }
    }
}
