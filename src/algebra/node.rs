//! Operator tree
//!
//! Every node owns its children, so the plan is always a tree. Rewrites
//! happen in place through `&mut PlanNode` handles: a stage takes the node
//! out of its slot, builds the replacement and writes it back with
//! [`PlanNode::replace_with`].

use super::expr::ValueExpr;
use super::pattern::{StatementPattern, Var};
use crate::federation::{DatasetRestriction, EndpointId, QueryId, StatementSource};
use crate::rdf::RdfTerm;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A node type reached a computation that has no rule for it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No rule for plan node: {0}")]
pub struct UnsupportedPlanShape(pub String);

/// Filter knowledge pushed into a leaf or group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterHints {
    /// Variables fixed to a constant by an equality filter
    pub bound: BTreeMap<String, RdfTerm>,
    /// Conditions evaluated next to the leaf
    pub conditions: Vec<ValueExpr>,
}

impl FilterHints {
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.conditions.is_empty()
    }

    /// Fix a variable to a constant value
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<RdfTerm>) {
        self.bound.insert(name.into(), value.into());
    }

    pub fn add_condition(&mut self, condition: ValueExpr) {
        self.conditions.push(condition);
    }

    fn without_bound(&self, vars: Vec<String>) -> Vec<String> {
        vars.into_iter()
            .filter(|v| !self.bound.contains_key(v))
            .collect()
    }
}

/// Leaf with more than one relevant source
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedStatement {
    pub pattern: StatementPattern,
    pub sources: Vec<StatementSource>,
    pub filters: FilterHints,
    /// Upper-bound hint from limit pushdown
    pub limit: Option<u64>,
}

impl SourcedStatement {
    pub fn new(pattern: StatementPattern, sources: Vec<StatementSource>) -> Self {
        Self {
            pattern,
            sources,
            filters: FilterHints::default(),
            limit: None,
        }
    }

    pub fn free_vars(&self) -> Vec<String> {
        self.filters.without_bound(self.pattern.free_vars())
    }
}

/// Leaf answerable by exactly one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusiveStatement {
    pub pattern: StatementPattern,
    pub owner: StatementSource,
    pub filters: FilterHints,
    pub limit: Option<u64>,
}

impl ExclusiveStatement {
    pub fn new(pattern: StatementPattern, owner: StatementSource) -> Self {
        Self {
            pattern,
            owner,
            filters: FilterHints::default(),
            limit: None,
        }
    }

    pub fn free_vars(&self) -> Vec<String> {
        self.filters.without_bound(self.pattern.free_vars())
    }
}

/// Batch of exclusive statements sharing one owner, dispatched together
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusiveGroup {
    /// Members in evaluation order
    pub members: Vec<ExclusiveStatement>,
    pub owner: StatementSource,
    pub filters: FilterHints,
    pub limit: Option<u64>,
}

impl ExclusiveGroup {
    pub fn new(members: Vec<ExclusiveStatement>, owner: StatementSource) -> Self {
        Self {
            members,
            owner,
            filters: FilterHints::default(),
            limit: None,
        }
    }

    /// Union of the members' free variables, minus the group's bound values
    pub fn free_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        for member in &self.members {
            merge_vars(&mut vars, member.free_vars());
        }
        self.filters.without_bound(vars)
    }
}

/// Left join; the right side is optional
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalJoin {
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    /// Condition attached to the OPTIONAL block
    pub condition: Option<ValueExpr>,
    /// Owning query, attached by the info collector
    pub query: Option<QueryId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub arg: Box<PlanNode>,
    pub variables: Vec<String>,
    /// Nested sub-select rather than the outermost query
    pub subquery: bool,
}

/// Inline solution table (`VALUES`)
#[derive(Debug, Clone, PartialEq)]
pub struct BindingsTable {
    pub variables: Vec<String>,
    pub rows: Vec<Vec<Option<RdfTerm>>>,
}

/// `SERVICE` call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSubQuery {
    /// Service IRI or variable
    pub target: Var,
    pub body: Box<PlanNode>,
    pub silent: bool,
    pub query: Option<QueryId>,
}

/// Whole plan forwarded to the only relevant endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct SingleSourceQuery {
    pub plan: Box<PlanNode>,
    pub endpoint: EndpointId,
    pub dataset: DatasetRestriction,
}

/// Solution modifiers kept on top of their argument
#[derive(Debug, Clone, PartialEq)]
pub enum ModifierKind {
    Distinct,
    Reduced,
    /// Sort keys with their ascending flag
    OrderBy(Vec<(ValueExpr, bool)>),
}

/// Logical plan node
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Raw statement pattern, before source selection
    Statement(StatementPattern),
    /// Statement with several relevant sources
    StatementSources(SourcedStatement),
    ExclusiveStatement(ExclusiveStatement),
    ExclusiveGroup(ExclusiveGroup),
    /// n-ary join
    NJoin(Vec<PlanNode>),
    /// n-ary union
    NUnion(Vec<PlanNode>),
    OptionalJoin(OptionalJoin),
    /// `MINUS`
    Difference {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    Filter {
        condition: ValueExpr,
        arg: Box<PlanNode>,
    },
    Projection(Projection),
    /// `BIND`
    Extension {
        arg: Box<PlanNode>,
        bindings: Vec<(String, ValueExpr)>,
    },
    /// `LIMIT` / `OFFSET`
    Slice {
        arg: Box<PlanNode>,
        offset: u64,
        limit: Option<u64>,
    },
    Modifier {
        kind: ModifierKind,
        arg: Box<PlanNode>,
    },
    BindingsTable(BindingsTable),
    RemoteSubQuery(RemoteSubQuery),
    SingleSourceQuery(SingleSourceQuery),
    /// Statically known to produce no solutions
    EmptyResult,
    /// Single empty solution
    TrueResult,
}

impl PlanNode {
    pub fn statement(pattern: StatementPattern) -> Self {
        PlanNode::Statement(pattern)
    }

    /// Binary join
    pub fn join(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::NJoin(vec![left, right])
    }

    /// Binary union
    pub fn union(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::NUnion(vec![left, right])
    }

    pub fn filter(condition: ValueExpr, arg: PlanNode) -> Self {
        PlanNode::Filter {
            condition,
            arg: Box::new(arg),
        }
    }

    /// Replace this node in its slot, returning the old subtree
    pub fn replace_with(&mut self, other: PlanNode) -> PlanNode {
        std::mem::replace(self, other)
    }

    /// Move the subtree out, leaving `EmptyResult` in the slot
    pub fn take(&mut self) -> PlanNode {
        self.replace_with(PlanNode::EmptyResult)
    }

    pub fn is_empty_result(&self) -> bool {
        matches!(self, PlanNode::EmptyResult)
    }

    pub fn is_true_result(&self) -> bool {
        matches!(self, PlanNode::TrueResult)
    }

    /// Owner of an exclusive statement or group
    pub fn exclusive_owner(&self) -> Option<&StatementSource> {
        match self {
            PlanNode::ExclusiveStatement(stmt) => Some(&stmt.owner),
            PlanNode::ExclusiveGroup(group) => Some(&group.owner),
            _ => None,
        }
    }

    /// Short node name used in logs and errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::Statement(_) => "Statement",
            PlanNode::StatementSources(_) => "StatementSources",
            PlanNode::ExclusiveStatement(_) => "ExclusiveStatement",
            PlanNode::ExclusiveGroup(_) => "ExclusiveGroup",
            PlanNode::NJoin(_) => "NJoin",
            PlanNode::NUnion(_) => "NUnion",
            PlanNode::OptionalJoin(_) => "OptionalJoin",
            PlanNode::Difference { .. } => "Difference",
            PlanNode::Filter { .. } => "Filter",
            PlanNode::Projection(_) => "Projection",
            PlanNode::Extension { .. } => "Extension",
            PlanNode::Slice { .. } => "Slice",
            PlanNode::Modifier { .. } => "Modifier",
            PlanNode::BindingsTable(_) => "BindingsTable",
            PlanNode::RemoteSubQuery(_) => "RemoteSubQuery",
            PlanNode::SingleSourceQuery(_) => "SingleSourceQuery",
            PlanNode::EmptyResult => "EmptyResult",
            PlanNode::TrueResult => "TrueResult",
        }
    }

    /// Direct children in the current query scope. Service bodies,
    /// pass-through plans and EXISTS patterns are not included.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::NJoin(args) | PlanNode::NUnion(args) => args.iter().collect(),
            PlanNode::OptionalJoin(opt) => vec![opt.left.as_ref(), opt.right.as_ref()],
            PlanNode::Difference { left, right } => vec![left.as_ref(), right.as_ref()],
            PlanNode::Filter { arg, .. }
            | PlanNode::Extension { arg, .. }
            | PlanNode::Slice { arg, .. }
            | PlanNode::Modifier { arg, .. } => vec![arg.as_ref()],
            PlanNode::Projection(proj) => vec![proj.arg.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`PlanNode::children`]
    pub fn children_mut(&mut self) -> Vec<&mut PlanNode> {
        match self {
            PlanNode::NJoin(args) | PlanNode::NUnion(args) => args.iter_mut().collect(),
            PlanNode::OptionalJoin(opt) => vec![opt.left.as_mut(), opt.right.as_mut()],
            PlanNode::Difference { left, right } => vec![left.as_mut(), right.as_mut()],
            PlanNode::Filter { arg, .. }
            | PlanNode::Extension { arg, .. }
            | PlanNode::Slice { arg, .. }
            | PlanNode::Modifier { arg, .. } => vec![arg.as_mut()],
            PlanNode::Projection(proj) => vec![proj.arg.as_mut()],
            _ => Vec::new(),
        }
    }

    /// Number of statement patterns in this scope
    pub fn statement_count(&self) -> usize {
        match self {
            PlanNode::Statement(_)
            | PlanNode::StatementSources(_)
            | PlanNode::ExclusiveStatement(_) => 1,
            PlanNode::ExclusiveGroup(group) => group.members.len(),
            other => other.children().iter().map(|c| c.statement_count()).sum(),
        }
    }

    /// Variables assigned by `BIND` or `VALUES` in this scope
    pub fn assigned_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_assigned(&mut vars);
        vars
    }

    fn collect_assigned(&self, vars: &mut Vec<String>) {
        match self {
            PlanNode::Extension { arg, bindings } => {
                arg.collect_assigned(vars);
                merge_vars(vars, bindings.iter().map(|(name, _)| name.clone()).collect());
            }
            PlanNode::BindingsTable(table) => merge_vars(vars, table.variables.clone()),
            // sub-selects have their own scope
            PlanNode::Projection(_) => {}
            other => {
                for child in other.children() {
                    child.collect_assigned(vars);
                }
            }
        }
    }

    /// Variables left unbound by this subtree, in first-seen order.
    /// Never cached: every rewrite changes the answer.
    pub fn free_vars(&self) -> Result<Vec<String>, UnsupportedPlanShape> {
        let vars = match self {
            PlanNode::Statement(pattern) => pattern.free_vars(),
            PlanNode::StatementSources(stmt) => stmt.free_vars(),
            PlanNode::ExclusiveStatement(stmt) => stmt.free_vars(),
            PlanNode::ExclusiveGroup(group) => group.free_vars(),
            PlanNode::NJoin(args) | PlanNode::NUnion(args) => {
                let mut vars = Vec::new();
                for arg in args {
                    merge_vars(&mut vars, arg.free_vars()?);
                }
                vars
            }
            PlanNode::OptionalJoin(opt) => {
                let mut vars = opt.left.free_vars()?;
                merge_vars(&mut vars, opt.right.free_vars()?);
                vars
            }
            PlanNode::Difference { left, .. } => left.free_vars()?,
            PlanNode::Filter { arg, .. }
            | PlanNode::Slice { arg, .. }
            | PlanNode::Modifier { arg, .. } => arg.free_vars()?,
            PlanNode::Projection(proj) => proj.variables.clone(),
            PlanNode::Extension { arg, bindings } => {
                let mut vars = arg.free_vars()?;
                merge_vars(&mut vars, bindings.iter().map(|(name, _)| name.clone()).collect());
                vars
            }
            PlanNode::BindingsTable(table) => table.variables.clone(),
            PlanNode::RemoteSubQuery(service) => {
                let mut vars = service.body.free_vars()?;
                if service.target.is_free() {
                    merge_vars(&mut vars, vec![service.target.name.clone()]);
                }
                vars
            }
            PlanNode::EmptyResult | PlanNode::TrueResult => Vec::new(),
            PlanNode::SingleSourceQuery(_) => {
                return Err(UnsupportedPlanShape(self.kind_name().to_string()))
            }
        };
        Ok(vars)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self {
            PlanNode::Statement(pattern) => writeln!(f, "{}Statement {}", indent, pattern)?,
            PlanNode::StatementSources(stmt) => {
                let sources: Vec<String> = stmt.sources.iter().map(|s| s.to_string()).collect();
                write!(f, "{}StatementSources {} [{}]", indent, stmt.pattern, sources.join(", "))?;
                fmt_hints(f, &stmt.filters, stmt.limit)?;
                writeln!(f)?;
            }
            PlanNode::ExclusiveStatement(stmt) => {
                write!(f, "{}ExclusiveStatement {} @{}", indent, stmt.pattern, stmt.owner)?;
                fmt_hints(f, &stmt.filters, stmt.limit)?;
                writeln!(f)?;
            }
            PlanNode::ExclusiveGroup(group) => {
                write!(f, "{}ExclusiveGroup @{}", indent, group.owner)?;
                fmt_hints(f, &group.filters, group.limit)?;
                writeln!(f)?;
                for member in &group.members {
                    write!(f, "{}  {}", indent, member.pattern)?;
                    fmt_hints(f, &member.filters, member.limit)?;
                    writeln!(f)?;
                }
            }
            PlanNode::OptionalJoin(opt) => {
                write!(f, "{}OptionalJoin", indent)?;
                if let Some(condition) = &opt.condition {
                    write!(f, " {}", condition)?;
                }
                writeln!(f)?;
            }
            PlanNode::Filter { condition, .. } => writeln!(f, "{}Filter {}", indent, condition)?,
            PlanNode::Projection(proj) => {
                let vars: Vec<String> = proj.variables.iter().map(|v| format!("?{}", v)).collect();
                let label = if proj.subquery { "SubQuery" } else { "Projection" };
                writeln!(f, "{}{} {}", indent, label, vars.join(" "))?;
            }
            PlanNode::Extension { bindings, .. } => {
                let binds: Vec<String> = bindings
                    .iter()
                    .map(|(name, expr)| format!("{} AS ?{}", expr, name))
                    .collect();
                writeln!(f, "{}Extension {}", indent, binds.join(", "))?;
            }
            PlanNode::Slice { offset, limit, .. } => {
                write!(f, "{}Slice offset={}", indent, offset)?;
                if let Some(limit) = limit {
                    write!(f, " limit={}", limit)?;
                }
                writeln!(f)?;
            }
            PlanNode::Modifier { kind, .. } => match kind {
                ModifierKind::Distinct => writeln!(f, "{}Distinct", indent)?,
                ModifierKind::Reduced => writeln!(f, "{}Reduced", indent)?,
                ModifierKind::OrderBy(keys) => {
                    let keys: Vec<String> = keys
                        .iter()
                        .map(|(expr, asc)| {
                            if *asc {
                                format!("ASC{}", expr)
                            } else {
                                format!("DESC{}", expr)
                            }
                        })
                        .collect();
                    writeln!(f, "{}OrderBy {}", indent, keys.join(" "))?;
                }
            },
            PlanNode::BindingsTable(table) => {
                let vars: Vec<String> = table.variables.iter().map(|v| format!("?{}", v)).collect();
                writeln!(f, "{}BindingsTable {} ({} rows)", indent, vars.join(" "), table.rows.len())?;
            }
            PlanNode::RemoteSubQuery(service) => {
                let silent = if service.silent { " SILENT" } else { "" };
                writeln!(f, "{}Service{} {}", indent, silent, service.target)?;
                service.body.fmt_tree(f, depth + 1)?;
            }
            PlanNode::SingleSourceQuery(single) => {
                writeln!(f, "{}SingleSourceQuery @{}", indent, single.endpoint)?;
                single.plan.fmt_tree(f, depth + 1)?;
            }
            other => writeln!(f, "{}{}", indent, other.kind_name())?,
        }
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

fn fmt_hints(f: &mut fmt::Formatter<'_>, hints: &FilterHints, limit: Option<u64>) -> fmt::Result {
    for (name, value) in &hints.bound {
        write!(f, " ?{}={}", name, value)?;
    }
    for condition in &hints.conditions {
        write!(f, " FILTER{}", condition)?;
    }
    if let Some(limit) = limit {
        write!(f, " limit={}", limit)?;
    }
    Ok(())
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Append the names not yet present, keeping first-seen order
pub(crate) fn merge_vars(into: &mut Vec<String>, vars: Vec<String>) {
    for var in vars {
        if !into.contains(&var) {
            into.push(var);
        }
    }
}
