//! The boolean query expression tree.
//!
//! A [`Query`] is a single predicate over a column path; a
//! [`QueryCompound`] combines children with And/Or. Both compose into a
//! [`Filter`], which also models the null (match everything) state.
//! Column paths may use dotted relationship shortcuts (`"group.name"`),
//! resolved later against the metadata registry.

use relmap_core::Value;
use serde::{Deserialize, Serialize};

/// Comparison operators for query leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Is,
    IsNot,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    DoesNotMatch,
}

impl Op {
    /// The negation of this operator.
    pub const fn negated(self) -> Self {
        match self {
            Op::Is => Op::IsNot,
            Op::IsNot => Op::Is,
            Op::LessThan => Op::GreaterThanOrEqual,
            Op::LessThanOrEqual => Op::GreaterThan,
            Op::GreaterThan => Op::LessThanOrEqual,
            Op::GreaterThanOrEqual => Op::LessThan,
            Op::In => Op::NotIn,
            Op::NotIn => Op::In,
            Op::Contains => Op::DoesNotMatch,
            Op::StartsWith => Op::DoesNotMatch,
            Op::EndsWith => Op::DoesNotMatch,
            Op::Matches => Op::DoesNotMatch,
            Op::DoesNotMatch => Op::Matches,
        }
    }

    /// Human-readable operator name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Op::Is => "is",
            Op::IsNot => "is_not",
            Op::LessThan => "less_than",
            Op::LessThanOrEqual => "less_than_or_equal",
            Op::GreaterThan => "greater_than",
            Op::GreaterThanOrEqual => "greater_than_or_equal",
            Op::In => "in",
            Op::NotIn => "not_in",
            Op::Contains => "contains",
            Op::StartsWith => "starts_with",
            Op::EndsWith => "ends_with",
            Op::Matches => "matches",
            Op::DoesNotMatch => "does_not_match",
        }
    }
}

/// Boolean combinator for compound nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

/// The right-hand side of a query leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A single bound value
    Value(Value),
    /// A sequence of bound values (for In/NotIn)
    Values(Vec<Value>),
    /// A nested query compiled as an IN-list sub-select
    Subselect(Box<Subselect>),
}

/// A nested query used as a leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subselect {
    /// Model the sub-query runs against
    pub model: String,
    /// Column of that model whose values feed the IN list
    pub column: String,
    /// Filter applied to the sub-query
    pub filter: Filter,
}

/// A leaf predicate: (column path, operator, operand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    path: Vec<String>,
    op: Op,
    operand: Operand,
    case_sensitive: bool,
}

impl Query {
    /// Start a predicate on a column path.
    ///
    /// The path may traverse relationships with dots: the first segments
    /// name reference columns or collectors, the last names a column on
    /// the final model.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(ToString::to_string).collect(),
            op: Op::Is,
            operand: Operand::Value(Value::Null),
            case_sensitive: true,
        }
    }

    fn with(mut self, op: Op, operand: Operand) -> Self {
        self.op = op;
        self.operand = operand;
        self
    }

    /// `path = value`; a null value compiles to an IS NULL check.
    pub fn is(self, value: impl Into<Value>) -> Self {
        self.with(Op::Is, Operand::Value(value.into()))
    }

    /// `path <> value`; a null value compiles to an IS NOT NULL check.
    pub fn is_not(self, value: impl Into<Value>) -> Self {
        self.with(Op::IsNot, Operand::Value(value.into()))
    }

    /// `path < value`.
    pub fn less_than(self, value: impl Into<Value>) -> Self {
        self.with(Op::LessThan, Operand::Value(value.into()))
    }

    /// `path <= value`.
    pub fn less_than_or_equal(self, value: impl Into<Value>) -> Self {
        self.with(Op::LessThanOrEqual, Operand::Value(value.into()))
    }

    /// `path > value`.
    pub fn greater_than(self, value: impl Into<Value>) -> Self {
        self.with(Op::GreaterThan, Operand::Value(value.into()))
    }

    /// `path >= value`.
    pub fn greater_than_or_equal(self, value: impl Into<Value>) -> Self {
        self.with(Op::GreaterThanOrEqual, Operand::Value(value.into()))
    }

    /// `path IN (values)`.
    pub fn is_in(self, values: Vec<Value>) -> Self {
        self.with(Op::In, Operand::Values(values))
    }

    /// `path NOT IN (values)`.
    pub fn not_in(self, values: Vec<Value>) -> Self {
        self.with(Op::NotIn, Operand::Values(values))
    }

    /// `path IN (SELECT column FROM model WHERE filter)`.
    pub fn in_query(self, subselect: Subselect) -> Self {
        self.with(Op::In, Operand::Subselect(Box::new(subselect)))
    }

    /// Substring match.
    pub fn contains(self, text: impl Into<String>) -> Self {
        self.with(Op::Contains, Operand::Value(Value::Text(text.into())))
    }

    /// Prefix match.
    pub fn starts_with(self, text: impl Into<String>) -> Self {
        self.with(Op::StartsWith, Operand::Value(Value::Text(text.into())))
    }

    /// Suffix match.
    pub fn ends_with(self, text: impl Into<String>) -> Self {
        self.with(Op::EndsWith, Operand::Value(Value::Text(text.into())))
    }

    /// Regular-expression match.
    pub fn matches(self, pattern: impl Into<String>) -> Self {
        self.with(Op::Matches, Operand::Value(Value::Text(pattern.into())))
    }

    /// Negated regular-expression match.
    pub fn does_not_match(self, pattern: impl Into<String>) -> Self {
        self.with(Op::DoesNotMatch, Operand::Value(Value::Text(pattern.into())))
    }

    /// Make pattern operators case-insensitive.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// A copy of this leaf with the operator negated.
    pub fn negated(&self) -> Self {
        let mut out = self.clone();
        out.op = self.op.negated();
        out
    }

    /// The column path segments.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The comparison operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// The right-hand side.
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Whether pattern operators are case-sensitive.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Combine with another predicate under And.
    pub fn and(self, other: impl Into<Filter>) -> Filter {
        Filter::from(self).and(other)
    }

    /// Combine with another predicate under Or.
    pub fn or(self, other: impl Into<Filter>) -> Filter {
        Filter::from(self).or(other)
    }
}

/// A compound node: two or more children under one boolean operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCompound {
    op: BoolOp,
    children: Vec<Filter>,
}

impl QueryCompound {
    /// Build a compound node. The operator is fixed per node.
    pub fn new(op: BoolOp, children: Vec<Filter>) -> Self {
        Self { op, children }
    }

    /// The boolean operator of this node.
    pub fn op(&self) -> BoolOp {
        self.op
    }

    /// Child filters, in order.
    pub fn children(&self) -> &[Filter] {
        &self.children
    }
}

/// A filter tree: null, one leaf, or a compound node.
///
/// The null filter matches everything and is the identity for `and`/`or`
/// composition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Filter {
    /// No constraint
    #[default]
    Null,
    /// A single predicate
    Leaf(Query),
    /// Children combined under And/Or
    Compound(QueryCompound),
}

impl Filter {
    /// Check whether this filter constrains nothing.
    pub fn is_null(&self) -> bool {
        matches!(self, Filter::Null)
    }

    /// Combine under And. Same-operator children are flattened.
    pub fn and(self, other: impl Into<Filter>) -> Filter {
        Filter::combine(BoolOp::And, self, other.into())
    }

    /// Combine under Or. Same-operator children are flattened.
    pub fn or(self, other: impl Into<Filter>) -> Filter {
        Filter::combine(BoolOp::Or, self, other.into())
    }

    /// Negate the whole tree: leaves flip operators, compounds apply
    /// De Morgan.
    pub fn negated(&self) -> Filter {
        match self {
            Filter::Null => Filter::Null,
            Filter::Leaf(query) => Filter::Leaf(query.negated()),
            Filter::Compound(compound) => {
                let op = match compound.op() {
                    BoolOp::And => BoolOp::Or,
                    BoolOp::Or => BoolOp::And,
                };
                Filter::Compound(QueryCompound::new(
                    op,
                    compound.children().iter().map(Filter::negated).collect(),
                ))
            }
        }
    }

    fn combine(op: BoolOp, left: Filter, right: Filter) -> Filter {
        match (left, right) {
            (Filter::Null, other) | (other, Filter::Null) => other,
            (left, right) => {
                let mut children = Vec::new();
                for side in [left, right] {
                    match side {
                        Filter::Compound(compound) if compound.op() == op => {
                            children.extend(compound.children);
                        }
                        other => children.push(other),
                    }
                }
                Filter::Compound(QueryCompound::new(op, children))
            }
        }
    }
}

impl From<Query> for Filter {
    fn from(query: Query) -> Self {
        Filter::Leaf(query)
    }
}

impl From<QueryCompound> for Filter {
    fn from(compound: QueryCompound) -> Self {
        Filter::Compound(compound)
    }
}

impl<R: Into<Filter>> std::ops::BitAnd<R> for Filter {
    type Output = Filter;

    fn bitand(self, rhs: R) -> Filter {
        self.and(rhs)
    }
}

impl<R: Into<Filter>> std::ops::BitOr<R> for Filter {
    type Output = Filter;

    fn bitor(self, rhs: R) -> Filter {
        self.or(rhs)
    }
}

impl<R: Into<Filter>> std::ops::BitAnd<R> for Query {
    type Output = Filter;

    fn bitand(self, rhs: R) -> Filter {
        self.and(rhs)
    }
}

impl<R: Into<Filter>> std::ops::BitOr<R> for Query {
    type Output = Filter;

    fn bitor(self, rhs: R) -> Filter {
        self.or(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_paths_split() {
        let query = Query::new("group.name").is("admins");
        assert_eq!(query.path(), ["group", "name"]);
        assert_eq!(query.op(), Op::Is);
    }

    #[test]
    fn operators_compose_compounds() {
        let filter = Query::new("age").greater_than(18) & Query::new("active").is(true);
        let Filter::Compound(compound) = &filter else {
            panic!("expected a compound");
        };
        assert_eq!(compound.op(), BoolOp::And);
        assert_eq!(compound.children().len(), 2);
    }

    #[test]
    fn same_op_children_flatten() {
        let filter = Query::new("a").is(1)
            & Query::new("b").is(2)
            & Query::new("c").is(3);
        let Filter::Compound(compound) = &filter else {
            panic!("expected a compound");
        };
        assert_eq!(compound.children().len(), 3);
    }

    #[test]
    fn mixed_ops_nest() {
        let filter =
            (Query::new("a").is(1) | Query::new("b").is(2)) & Query::new("c").is(3);
        let Filter::Compound(outer) = &filter else {
            panic!("expected a compound");
        };
        assert_eq!(outer.op(), BoolOp::And);
        assert_eq!(outer.children().len(), 2);
        assert!(matches!(outer.children()[0], Filter::Compound(_)));
    }

    #[test]
    fn null_filter_is_identity() {
        let query = Query::new("a").is(1);
        let combined = Filter::Null.and(query.clone());
        assert_eq!(combined, Filter::from(query));
    }

    #[test]
    fn negation() {
        assert_eq!(Op::LessThan.negated(), Op::GreaterThanOrEqual);
        assert_eq!(Op::In.negated(), Op::NotIn);

        let filter = (Query::new("a").is(1) & Query::new("b").is(2)).negated();
        let Filter::Compound(compound) = &filter else {
            panic!("expected a compound");
        };
        assert_eq!(compound.op(), BoolOp::Or);
        for child in compound.children() {
            let Filter::Leaf(leaf) = child else {
                panic!("expected a leaf");
            };
            assert_eq!(leaf.op(), Op::IsNot);
        }
    }

    #[test]
    fn json_round_trip() {
        let filter = Query::new("group.name").is("admins") & Query::new("age").greater_than(21);
        let json = serde_json::to_string(&filter).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }
}
