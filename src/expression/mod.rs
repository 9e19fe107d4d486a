//! Minimal expression nodes needed to drive filters and UPDATE assignments.

use crate::context::Context;
use crate::core::{DbError, Result, Row, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub trait Expression: Send + Sync + fmt::Display {
    fn eval(&self, ctx: &Context, row: &Row) -> Result<Value>;
}

pub type ExprRef = Arc<dyn Expression>;

#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl Expression for Literal {
    fn eval(&self, _ctx: &Context, _row: &Row) -> Result<Value> {
        Ok(self.0.clone())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::Text(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Reads one field of the input row.
#[derive(Debug, Clone)]
pub struct GetField {
    pub index: usize,
    pub name: String,
}

impl GetField {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl Expression for GetField {
    fn eval(&self, _ctx: &Context, row: &Row) -> Result<Value> {
        row.get(self.index).cloned().ok_or_else(|| {
            DbError::ExecutionError(format!(
                "field '{}' at index {} out of range for row of width {}",
                self.name,
                self.index,
                row.len()
            ))
        })
    }
}

impl fmt::Display for GetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `SET field = value`: evaluates to the whole input row with one field replaced.
pub struct SetField {
    pub field: GetField,
    pub value: ExprRef,
}

impl SetField {
    pub fn new(field: GetField, value: ExprRef) -> Self {
        Self { field, value }
    }
}

impl Expression for SetField {
    fn eval(&self, ctx: &Context, row: &Row) -> Result<Value> {
        let value = self.value.eval(ctx, row)?;
        let mut updated = row.clone();
        let slot = updated.get_mut(self.field.index).ok_or_else(|| {
            DbError::ExecutionError(format!(
                "cannot set field '{}': index {} out of range",
                self.field.name, self.field.index
            ))
        })?;
        *slot = value;
        Ok(Value::Tuple(updated))
    }
}

impl fmt::Display for SetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SET {} = {}", self.field, self.value)
    }
}

/// SQL `=`: NULL if either side is NULL.
pub struct Equals {
    pub left: ExprRef,
    pub right: ExprRef,
}

impl Equals {
    pub fn new(left: ExprRef, right: ExprRef) -> Self {
        Self { left, right }
    }
}

impl Expression for Equals {
    fn eval(&self, ctx: &Context, row: &Row) -> Result<Value> {
        let left = self.left.eval(ctx, row)?;
        let right = self.right.eval(ctx, row)?;
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Boolean(left.compare(&right)? == Ordering::Equal))
    }
}

impl fmt::Display for Equals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}
