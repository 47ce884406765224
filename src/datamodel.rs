//! Expression evaluator collaborator: `cond`/value evaluation and
//! assignment, plus a minimal reference implementation.
//!
//! The engine depends only on the trait; `ReferenceDatamodel` exists so the
//! crate (and its tests) can run end to end without an external
//! ECMAScript/XPath engine, a minimal stand-in for "some condition
//! system" rather than a real expression language.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::ids::{ConditionId, ExprId, LocationId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    Null,
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Null => false,
        }
    }
}

/// Everything a condition/value expression may read. `in_state` is the
/// `In(id)` predicate over the *name* of a state (the
/// datamodel collaborator doesn't see `StateId`s).
pub struct EvalContext<'a> {
    pub current_event: Option<&'a Event>,
    pub in_state: &'a dyn Fn(&str) -> bool,
    pub variables: &'a HashMap<String, Value>,
}

/// Condition/value/assignment evaluator.
/// `eval_condition` must return `false` on any internal error; it never
/// propagates a `Result` to the engine.
pub trait ExpressionEvaluator {
    fn eval_condition(&self, cond: ConditionId, ctx: &EvalContext) -> bool;
    fn eval_value(&self, expr: ExprId, ctx: &EvalContext) -> Option<Value>;
    /// Returns `true` if the assignment succeeded; `false` leaves the
    /// datamodel untouched and is logged by the caller, never returned as
    /// an engine-level error.
    fn assign(&mut self, location: LocationId, value: Value, vars: &mut HashMap<String, Value>) -> bool;
}

/// A tiny boolean/equality expression language: enough to express every
/// guard condition this crate's own tests need, compiled ahead of time
/// into a flat table the way a real
/// ECMAScript/XPath front end would compile into bytecode or an AST table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    BoolLit(bool),
    NumberLit(f64),
    StrLit(String),
    Var(String),
    /// `In(stateName)`.
    In(String),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Default)]
pub struct ReferenceDatamodel {
    exprs: Vec<Expr>,
    locations: Vec<String>,
}

impl ReferenceDatamodel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_condition(&mut self, expr: Expr) -> ConditionId {
        self.exprs.push(expr);
        ConditionId((self.exprs.len() - 1) as u32)
    }

    pub fn compile_value(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId((self.exprs.len() - 1) as u32)
    }

    pub fn compile_location(&mut self, name: impl Into<String>) -> LocationId {
        self.locations.push(name.into());
        LocationId((self.locations.len() - 1) as u32)
    }

    fn eval(&self, expr: &Expr, ctx: &EvalContext) -> Value {
        match expr {
            Expr::BoolLit(b) => Value::Bool(*b),
            Expr::NumberLit(n) => Value::Number(*n),
            Expr::StrLit(s) => Value::Str(s.clone()),
            Expr::Var(name) => ctx.variables.get(name).cloned().unwrap_or(Value::Null),
            Expr::In(name) => Value::Bool((ctx.in_state)(name)),
            Expr::Eq(a, b) => Value::Bool(self.eval(a, ctx) == self.eval(b, ctx)),
            Expr::NotEq(a, b) => Value::Bool(self.eval(a, ctx) != self.eval(b, ctx)),
            Expr::And(a, b) => Value::Bool(self.eval(a, ctx).truthy() && self.eval(b, ctx).truthy()),
            Expr::Or(a, b) => Value::Bool(self.eval(a, ctx).truthy() || self.eval(b, ctx).truthy()),
            Expr::Not(a) => Value::Bool(!self.eval(a, ctx).truthy()),
        }
    }
}

impl ExpressionEvaluator for ReferenceDatamodel {
    fn eval_condition(&self, cond: ConditionId, ctx: &EvalContext) -> bool {
        match self.exprs.get(cond.0 as usize) {
            Some(expr) => self.eval(expr, ctx).truthy(),
            None => {
                tracing::warn!(condition = cond.0, "condition-eval failure: unresolved handle");
                false
            }
        }
    }

    fn eval_value(&self, expr: ExprId, ctx: &EvalContext) -> Option<Value> {
        self.exprs.get(expr.0 as usize).map(|e| self.eval(e, ctx))
    }

    fn assign(&mut self, location: LocationId, value: Value, vars: &mut HashMap<String, Value>) -> bool {
        match self.locations.get(location.0 as usize) {
            Some(name) => {
                vars.insert(name.clone(), value);
                true
            }
            None => {
                tracing::warn!(location = location.0, "assignment failure: unresolved location");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_condition_against_variable() {
        let mut dm = ReferenceDatamodel::new();
        let cond = dm.compile_condition(Expr::Eq(
            Box::new(Expr::Var("x".into())),
            Box::new(Expr::NumberLit(1.0)),
        ));
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), Value::Number(1.0));
        let in_state = |_: &str| false;
        let ctx = EvalContext { current_event: None, in_state: &in_state, variables: &vars };
        assert!(dm.eval_condition(cond, &ctx));
    }

    #[test]
    fn unresolved_condition_is_false() {
        let dm = ReferenceDatamodel::new();
        let vars = HashMap::new();
        let in_state = |_: &str| false;
        let ctx = EvalContext { current_event: None, in_state: &in_state, variables: &vars };
        assert!(!dm.eval_condition(ConditionId(42), &ctx));
    }

    #[test]
    fn in_predicate_reads_the_supplied_closure() {
        let mut dm = ReferenceDatamodel::new();
        let cond = dm.compile_condition(Expr::In("red".into()));
        let vars = HashMap::new();
        let in_state = |name: &str| name == "red";
        let ctx = EvalContext { current_event: None, in_state: &in_state, variables: &vars };
        assert!(dm.eval_condition(cond, &ctx));
    }
}
