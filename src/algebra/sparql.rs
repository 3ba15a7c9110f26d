//! SPARQL front end
//!
//! Parsing is delegated to `spargebra`; this module only translates its
//! algebra into [`PlanNode`] trees. Joins and unions come out binary and
//! are flattened later by the info collector.

use super::expr::{CompareOp, ValueExpr};
use super::node::{BindingsTable, ModifierKind, OptionalJoin, PlanNode, Projection, RemoteSubQuery};
use super::pattern::{PathLength, StatementPattern, Var};
use crate::federation::DatasetRestriction;
use crate::rdf::{Literal, NamedNode, RdfTerm};
use spargebra::algebra::{
    Expression, GraphPattern, OrderExpression, PropertyPathExpression,
};
use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;
use thiserror::Error;

/// Query translation errors
#[derive(Error, Debug)]
pub enum AlgebraError {
    /// Query text could not be parsed
    #[error("SPARQL syntax error: {0}")]
    Syntax(String),

    /// Construct outside the supported subset
    #[error("Unsupported SPARQL construct: {0}")]
    Unsupported(String),
}

pub type AlgebraResult<T> = Result<T, AlgebraError>;

/// Query form of a parsed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
}

/// A translated query, ready for optimization
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub plan: PlanNode,
    /// Graphs from FROM / FROM NAMED
    pub dataset: DatasetRestriction,
    pub form: QueryForm,
}

/// Parse SPARQL query text and translate it into a plan
pub fn parse_query(text: &str) -> AlgebraResult<ParsedQuery> {
    let query = Query::parse(text, None).map_err(|e| AlgebraError::Syntax(e.to_string()))?;

    let (pattern, dataset, form) = match query {
        Query::Select {
            pattern, dataset, ..
        } => (pattern, dataset, QueryForm::Select),
        Query::Ask {
            pattern, dataset, ..
        } => (pattern, dataset, QueryForm::Ask),
        Query::Construct { .. } => {
            return Err(AlgebraError::Unsupported("CONSTRUCT query".to_string()))
        }
        Query::Describe { .. } => {
            return Err(AlgebraError::Unsupported("DESCRIBE query".to_string()))
        }
    };

    let mut restriction = DatasetRestriction::default();
    if let Some(dataset) = dataset {
        restriction.default_graphs = dataset.default.into_iter().map(NamedNode::from).collect();
        restriction.named_graphs = dataset
            .named
            .unwrap_or_default()
            .into_iter()
            .map(NamedNode::from)
            .collect();
    }

    // ASK has no projection of its own, so every SELECT inside it is a sub-select
    let mut translator = Translator {
        seen_projection: matches!(form, QueryForm::Ask),
    };
    let plan = translator.pattern(&pattern, None)?;
    Ok(ParsedQuery {
        plan,
        dataset: restriction,
        form,
    })
}

#[derive(Default)]
struct Translator {
    /// Set once the outermost projection has been translated
    seen_projection: bool,
}

impl Translator {
    fn pattern(&mut self, pattern: &GraphPattern, graph: Option<&Var>) -> AlgebraResult<PlanNode> {
        let node = match pattern {
            GraphPattern::Bgp { patterns } => {
                let mut statements = patterns
                    .iter()
                    .map(|triple| triple_pattern(triple, graph).map(PlanNode::statement));
                match statements.next() {
                    None => PlanNode::TrueResult,
                    Some(first) => {
                        let mut node = first?;
                        for next in statements {
                            node = PlanNode::join(node, next?);
                        }
                        node
                    }
                }
            }
            GraphPattern::Path {
                subject,
                path,
                object,
            } => PlanNode::statement(path_pattern(subject, path, object, graph)?),
            GraphPattern::Join { left, right } => {
                PlanNode::join(self.pattern(left, graph)?, self.pattern(right, graph)?)
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => PlanNode::OptionalJoin(OptionalJoin {
                left: Box::new(self.pattern(left, graph)?),
                right: Box::new(self.pattern(right, graph)?),
                condition: expression
                    .as_ref()
                    .map(|e| self.expression(e, graph))
                    .transpose()?,
                query: None,
            }),
            GraphPattern::Filter { expr, inner } => {
                let condition = self.expression(expr, graph)?;
                PlanNode::filter(condition, self.pattern(inner, graph)?)
            }
            GraphPattern::Union { left, right } => {
                PlanNode::union(self.pattern(left, graph)?, self.pattern(right, graph)?)
            }
            GraphPattern::Graph { name, inner } => {
                let context = named_node_pattern(name);
                self.pattern(inner, Some(&context))?
            }
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let arg = self.pattern(inner, graph)?;
                let expr = self.expression(expression, graph)?;
                PlanNode::Extension {
                    arg: Box::new(arg),
                    bindings: vec![(variable.as_str().to_string(), expr)],
                }
            }
            GraphPattern::Minus { left, right } => PlanNode::Difference {
                left: Box::new(self.pattern(left, graph)?),
                right: Box::new(self.pattern(right, graph)?),
            },
            GraphPattern::Values {
                variables,
                bindings,
            } => {
                let rows = bindings
                    .iter()
                    .map(|row| row.iter().map(|v| v.as_ref().map(ground_term).transpose()).collect())
                    .collect::<AlgebraResult<Vec<Vec<Option<RdfTerm>>>>>()?;
                PlanNode::BindingsTable(BindingsTable {
                    variables: variables.iter().map(|v| v.as_str().to_string()).collect(),
                    rows,
                })
            }
            GraphPattern::OrderBy { inner, expression } => {
                let arg = self.pattern(inner, graph)?;
                let keys = expression
                    .iter()
                    .map(|order| match order {
                        OrderExpression::Asc(e) => Ok((self.expression(e, graph)?, true)),
                        OrderExpression::Desc(e) => Ok((self.expression(e, graph)?, false)),
                    })
                    .collect::<AlgebraResult<Vec<_>>>()?;
                PlanNode::Modifier {
                    kind: ModifierKind::OrderBy(keys),
                    arg: Box::new(arg),
                }
            }
            GraphPattern::Project { inner, variables } => {
                let subquery = self.seen_projection;
                self.seen_projection = true;
                PlanNode::Projection(Projection {
                    arg: Box::new(self.pattern(inner, graph)?),
                    variables: variables.iter().map(|v| v.as_str().to_string()).collect(),
                    subquery,
                })
            }
            GraphPattern::Distinct { inner } => PlanNode::Modifier {
                kind: ModifierKind::Distinct,
                arg: Box::new(self.pattern(inner, graph)?),
            },
            GraphPattern::Reduced { inner } => PlanNode::Modifier {
                kind: ModifierKind::Reduced,
                arg: Box::new(self.pattern(inner, graph)?),
            },
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => PlanNode::Slice {
                arg: Box::new(self.pattern(inner, graph)?),
                offset: *start as u64,
                limit: length.map(|l| l as u64),
            },
            GraphPattern::Service {
                name,
                inner,
                silent,
            } => PlanNode::RemoteSubQuery(RemoteSubQuery {
                target: named_node_pattern(name),
                body: Box::new(self.pattern(inner, None)?),
                silent: *silent,
                query: None,
            }),
            GraphPattern::Group { .. } => {
                return Err(AlgebraError::Unsupported("aggregation".to_string()))
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(AlgebraError::Unsupported(format!("graph pattern {}", other)))
            }
        };
        Ok(node)
    }

    fn expression(&mut self, expr: &Expression, graph: Option<&Var>) -> AlgebraResult<ValueExpr> {
        let value = match expr {
            Expression::NamedNode(n) => ValueExpr::Const(NamedNode::from(n.clone()).into()),
            Expression::Literal(l) => ValueExpr::Const(Literal::from(l.clone()).into()),
            Expression::Variable(v) => ValueExpr::Var(v.as_str().to_string()),
            Expression::And(l, r) => ValueExpr::And(
                Box::new(self.expression(l, graph)?),
                Box::new(self.expression(r, graph)?),
            ),
            Expression::Or(l, r) => ValueExpr::Or(
                Box::new(self.expression(l, graph)?),
                Box::new(self.expression(r, graph)?),
            ),
            Expression::Equal(l, r) => self.compare(CompareOp::Eq, l, r, graph)?,
            Expression::Greater(l, r) => self.compare(CompareOp::Gt, l, r, graph)?,
            Expression::GreaterOrEqual(l, r) => self.compare(CompareOp::Ge, l, r, graph)?,
            Expression::Less(l, r) => self.compare(CompareOp::Lt, l, r, graph)?,
            Expression::LessOrEqual(l, r) => self.compare(CompareOp::Le, l, r, graph)?,
            Expression::Not(inner) => match inner.as_ref() {
                Expression::Exists(pattern) => ValueExpr::Exists {
                    negated: true,
                    pattern: Box::new(self.pattern(pattern, graph)?),
                },
                Expression::Equal(l, r) => self.compare(CompareOp::Ne, l, r, graph)?,
                other => ValueExpr::Not(Box::new(self.expression(other, graph)?)),
            },
            Expression::Exists(pattern) => ValueExpr::Exists {
                negated: false,
                pattern: Box::new(self.pattern(pattern, graph)?),
            },
            Expression::Bound(v) => ValueExpr::Bound(v.as_str().to_string()),
            Expression::SameTerm(l, r) => self.call("sameTerm", &[l.as_ref(), r.as_ref()], graph)?,
            Expression::Add(l, r) => self.call("+", &[l.as_ref(), r.as_ref()], graph)?,
            Expression::Subtract(l, r) => self.call("-", &[l.as_ref(), r.as_ref()], graph)?,
            Expression::Multiply(l, r) => self.call("*", &[l.as_ref(), r.as_ref()], graph)?,
            Expression::Divide(l, r) => self.call("/", &[l.as_ref(), r.as_ref()], graph)?,
            Expression::UnaryPlus(e) => self.call("+", &[e.as_ref()], graph)?,
            Expression::UnaryMinus(e) => self.call("-", &[e.as_ref()], graph)?,
            Expression::In(e, list) => {
                let mut args = vec![self.expression(e, graph)?];
                for item in list {
                    args.push(self.expression(item, graph)?);
                }
                ValueExpr::Call {
                    function: "IN".to_string(),
                    args,
                }
            }
            Expression::If(c, t, e) => self.call("IF", &[c.as_ref(), t.as_ref(), e.as_ref()], graph)?,
            Expression::Coalesce(list) => {
                let args = list
                    .iter()
                    .map(|e| self.expression(e, graph))
                    .collect::<AlgebraResult<Vec<_>>>()?;
                ValueExpr::Call {
                    function: "COALESCE".to_string(),
                    args,
                }
            }
            Expression::FunctionCall(function, list) => {
                let args = list
                    .iter()
                    .map(|e| self.expression(e, graph))
                    .collect::<AlgebraResult<Vec<_>>>()?;
                ValueExpr::Call {
                    function: function.to_string(),
                    args,
                }
            }
            #[allow(unreachable_patterns)]
            other => return Err(AlgebraError::Unsupported(format!("expression {}", other))),
        };
        Ok(value)
    }

    fn compare(
        &mut self,
        op: CompareOp,
        left: &Expression,
        right: &Expression,
        graph: Option<&Var>,
    ) -> AlgebraResult<ValueExpr> {
        Ok(ValueExpr::compare(
            op,
            self.expression(left, graph)?,
            self.expression(right, graph)?,
        ))
    }

    fn call(
        &mut self,
        function: &str,
        args: &[&Expression],
        graph: Option<&Var>,
    ) -> AlgebraResult<ValueExpr> {
        let args = args
            .iter()
            .map(|e| self.expression(e, graph))
            .collect::<AlgebraResult<Vec<_>>>()?;
        Ok(ValueExpr::Call {
            function: function.to_string(),
            args,
        })
    }
}

fn triple_pattern(triple: &TriplePattern, graph: Option<&Var>) -> AlgebraResult<StatementPattern> {
    let pattern = StatementPattern::new(
        term_pattern(&triple.subject)?,
        named_node_pattern(&triple.predicate),
        term_pattern(&triple.object)?,
    );
    Ok(match graph {
        Some(context) => pattern.with_context(context.clone()),
        None => pattern,
    })
}

fn path_pattern(
    subject: &TermPattern,
    path: &PropertyPathExpression,
    object: &TermPattern,
    graph: Option<&Var>,
) -> AlgebraResult<StatementPattern> {
    let (subject, object) = (term_pattern(subject)?, term_pattern(object)?);
    let pattern = match path {
        PropertyPathExpression::NamedNode(p) => {
            StatementPattern::new(subject, Var::constant(NamedNode::from(p.clone())), object)
        }
        PropertyPathExpression::Reverse(inner) => match inner.as_ref() {
            PropertyPathExpression::NamedNode(p) => {
                StatementPattern::new(object, Var::constant(NamedNode::from(p.clone())), subject)
            }
            other => return Err(AlgebraError::Unsupported(format!("property path {}", other))),
        },
        PropertyPathExpression::OneOrMore(inner) | PropertyPathExpression::ZeroOrMore(inner) => {
            let length = match path {
                PropertyPathExpression::OneOrMore(_) => PathLength::OneOrMore,
                _ => PathLength::ZeroOrMore,
            };
            match inner.as_ref() {
                PropertyPathExpression::NamedNode(p) => StatementPattern::new(
                    subject,
                    Var::constant(NamedNode::from(p.clone())),
                    object,
                )
                .with_path(length),
                other => {
                    return Err(AlgebraError::Unsupported(format!("property path {}", other)))
                }
            }
        }
        other => return Err(AlgebraError::Unsupported(format!("property path {}", other))),
    };
    Ok(match graph {
        Some(context) => pattern.with_context(context.clone()),
        None => pattern,
    })
}

fn term_pattern(term: &TermPattern) -> AlgebraResult<Var> {
    match term {
        TermPattern::NamedNode(n) => Ok(Var::constant(NamedNode::from(n.clone()))),
        TermPattern::Literal(l) => Ok(Var::constant(Literal::from(l.clone()))),
        TermPattern::Variable(v) => Ok(Var::variable(v.as_str())),
        // query blank nodes are non-distinguished variables
        TermPattern::BlankNode(b) => Ok(Var::variable(format!("_{}", b.as_str()))),
        #[allow(unreachable_patterns)]
        other => Err(AlgebraError::Unsupported(format!("term {}", other))),
    }
}

fn named_node_pattern(pattern: &NamedNodePattern) -> Var {
    match pattern {
        NamedNodePattern::NamedNode(n) => Var::constant(NamedNode::from(n.clone())),
        NamedNodePattern::Variable(v) => Var::variable(v.as_str()),
    }
}

fn ground_term(term: &GroundTerm) -> AlgebraResult<RdfTerm> {
    match term {
        GroundTerm::NamedNode(n) => Ok(NamedNode::from(n.clone()).into()),
        GroundTerm::Literal(l) => Ok(Literal::from(l.clone()).into()),
        #[allow(unreachable_patterns)]
        other => Err(AlgebraError::Unsupported(format!("term {}", other))),
    }
}
