//! Filter and binding expressions

use super::node::PlanNode;
use crate::rdf::{NamedNode, RdfTerm};
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", op)
    }
}

/// Value expression used by FILTER, BIND and ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// Variable reference
    Var(String),
    /// Constant term
    Const(RdfTerm),
    And(Box<ValueExpr>, Box<ValueExpr>),
    Or(Box<ValueExpr>, Box<ValueExpr>),
    Not(Box<ValueExpr>),
    Compare {
        op: CompareOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
    /// `BOUND(?v)`
    Bound(String),
    /// Built-in or extension function call
    Call { function: String, args: Vec<ValueExpr> },
    /// `EXISTS { ... }` / `NOT EXISTS { ... }`
    Exists { negated: bool, pattern: Box<PlanNode> },
}

impl ValueExpr {
    /// Convenience constructor for comparisons
    pub fn compare(op: CompareOp, left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Split on top-level conjunctions, left to right
    pub fn into_conjuncts(self) -> Vec<ValueExpr> {
        match self {
            ValueExpr::And(left, right) => {
                let mut conjuncts = left.into_conjuncts();
                conjuncts.extend(right.into_conjuncts());
                conjuncts
            }
            other => vec![other],
        }
    }

    /// Left-deep conjunction of the given expressions
    pub fn conjoin(conjuncts: Vec<ValueExpr>) -> Option<ValueExpr> {
        conjuncts
            .into_iter()
            .reduce(|acc, next| ValueExpr::And(Box::new(acc), Box::new(next)))
    }

    /// Whether the expression may be pushed below its filter as a unit.
    /// Conjunctions and disjunctions stay where they are; negation is
    /// decided by its operand.
    pub fn is_pushable(&self) -> bool {
        match self {
            ValueExpr::And(..) | ValueExpr::Or(..) => false,
            ValueExpr::Not(inner) => inner.is_pushable(),
            ValueExpr::Exists { .. } => false,
            _ => true,
        }
    }

    /// Variables referenced by the expression, in first-seen order
    pub fn vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut Vec<String>) {
        match self {
            ValueExpr::Var(name) | ValueExpr::Bound(name) => push_unique(vars, name),
            ValueExpr::Const(_) => {}
            ValueExpr::And(l, r) | ValueExpr::Or(l, r) => {
                l.collect_vars(vars);
                r.collect_vars(vars);
            }
            ValueExpr::Not(inner) => inner.collect_vars(vars),
            ValueExpr::Compare { left, right, .. } => {
                left.collect_vars(vars);
                right.collect_vars(vars);
            }
            ValueExpr::Call { args, .. } => {
                for arg in args {
                    arg.collect_vars(vars);
                }
            }
            ValueExpr::Exists { pattern, .. } => {
                for name in pattern.free_vars().unwrap_or_default() {
                    push_unique(vars, &name);
                }
            }
        }
    }

    /// Matches `?v = <iri>` (either side). Only IRIs qualify: literal
    /// equality is value-based and cannot be replaced by a term binding.
    pub fn as_var_equals_iri(&self) -> Option<(&str, &NamedNode)> {
        if let ValueExpr::Compare {
            op: CompareOp::Eq,
            left,
            right,
        } = self
        {
            match (left.as_ref(), right.as_ref()) {
                (ValueExpr::Var(name), ValueExpr::Const(RdfTerm::NamedNode(iri)))
                | (ValueExpr::Const(RdfTerm::NamedNode(iri)), ValueExpr::Var(name)) => {
                    return Some((name.as_str(), iri));
                }
                _ => {}
            }
        }
        None
    }
}

fn push_unique(vars: &mut Vec<String>, name: &str) {
    if !vars.iter().any(|v| v == name) {
        vars.push(name.to_string());
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Var(name) => write!(f, "?{}", name),
            ValueExpr::Const(term) => write!(f, "{}", term),
            ValueExpr::And(l, r) => write!(f, "({} && {})", l, r),
            ValueExpr::Or(l, r) => write!(f, "({} || {})", l, r),
            ValueExpr::Not(inner) => write!(f, "!{}", inner),
            ValueExpr::Compare { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ValueExpr::Bound(name) => write!(f, "BOUND(?{})", name),
            ValueExpr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ValueExpr::Exists { negated, .. } => {
                if *negated {
                    write!(f, "NOT EXISTS {{...}}")
                } else {
                    write!(f, "EXISTS {{...}}")
                }
            }
        }
    }
}
