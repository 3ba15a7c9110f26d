//! Statement patterns and query variables

use crate::rdf::RdfTerm;
use std::fmt;

/// Position of a statement pattern in depth-first plan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PatternId(pub usize);

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pattern position: either a named variable or a constant term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    /// Variable name (constants carry their rendered term)
    pub name: String,
    /// Constant value, if bound
    pub value: Option<RdfTerm>,
}

impl Var {
    /// Unbound variable `?name`
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Constant position
    pub fn constant(term: impl Into<RdfTerm>) -> Self {
        let term = term.into();
        Self {
            name: term.to_string(),
            value: Some(term),
        }
    }

    /// True when this position is a variable
    pub fn is_free(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(term) => write!(f, "{}", term),
            None => write!(f, "?{}", self.name),
        }
    }
}

/// Arbitrary-length path length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathLength {
    /// `p+`
    OneOrMore,
    /// `p*`
    ZeroOrMore,
}

impl PathLength {
    /// Minimum number of hops
    pub fn min_length(&self) -> usize {
        match self {
            PathLength::OneOrMore => 1,
            PathLength::ZeroOrMore => 0,
        }
    }
}

/// A triple pattern, optionally scoped to a graph, optionally a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementPattern {
    /// Assigned by the info collector
    pub id: PatternId,
    pub subject: Var,
    pub predicate: Var,
    pub object: Var,
    /// Graph position (`GRAPH ?g { ... }`)
    pub context: Option<Var>,
    /// Set for `p+` / `p*` paths over the predicate
    pub path: Option<PathLength>,
}

impl StatementPattern {
    /// Create a default-graph pattern
    pub fn new(subject: Var, predicate: Var, object: Var) -> Self {
        Self {
            id: PatternId::default(),
            subject,
            predicate,
            object,
            context: None,
            path: None,
        }
    }

    /// Scope the pattern to a graph
    pub fn with_context(mut self, context: Var) -> Self {
        self.context = Some(context);
        self
    }

    /// Turn the pattern into an arbitrary-length path
    pub fn with_path(mut self, path: PathLength) -> Self {
        self.path = Some(path);
        self
    }

    /// Positions in subject, predicate, object, context order
    pub fn positions(&self) -> impl Iterator<Item = &Var> {
        [Some(&self.subject), Some(&self.predicate), Some(&self.object)]
            .into_iter()
            .chain(std::iter::once(self.context.as_ref()))
            .flatten()
    }

    /// Names of the unbound positions, in position order without duplicates
    pub fn free_vars(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for var in self.positions().filter(|v| v.is_free()) {
            if !vars.contains(&var.name) {
                vars.push(var.name.clone());
            }
        }
        vars
    }

    /// True when every position is a constant
    pub fn is_ground(&self) -> bool {
        self.positions().all(|v| !v.is_free())
    }

    pub fn is_path(&self) -> bool {
        self.path.is_some()
    }
}

impl fmt::Display for StatementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.path {
            Some(PathLength::OneOrMore) => "+",
            Some(PathLength::ZeroOrMore) => "*",
            None => "",
        };
        write!(f, "{} {}{} {}", self.subject, self.predicate, path, self.object)?;
        if let Some(context) = &self.context {
            write!(f, " GRAPH {}", context)?;
        }
        Ok(())
    }
}
