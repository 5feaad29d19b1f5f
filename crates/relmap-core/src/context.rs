//! Per-operation resolution parameters.
//!
//! A [`Context`] bundles locale, expansion, ordering, paging, projection
//! and access intent for one logical operation. Contexts never mutate an
//! outer scope: stacking is done through [`Context::scoped`], which pushes
//! an override frame onto a thread-local stack and pops it when the guard
//! drops, on every exit path.

use crate::error::{ContextError, Error, Result};
use std::cell::RefCell;

/// Locale used when none is supplied by any context frame.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Read/write intent of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Read-only; may use any pooled connection.
    #[default]
    Read,
    /// Mutating; must acquire a write-capable connection.
    Write,
}

/// Sort direction for an order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// SQL keyword for this direction.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// The opposite direction.
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderClause {
    pub column: String,
    pub direction: Direction,
}

impl OrderClause {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Resolution parameters for one operation.
///
/// Unset fields fall through to the next outer frame (or to defaults);
/// set fields win. Cloning is cheap enough that every merge produces a
/// fresh value rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Context {
    /// Locale for I18n column resolution
    pub locale: Option<String>,
    /// Relationship paths to expand onto returned records
    pub expand: Vec<String>,
    /// Ordering terms
    pub order: Vec<OrderClause>,
    /// Target columns for projection (empty = all stored columns)
    pub columns: Vec<String>,
    /// Maximum number of records
    pub limit: Option<u64>,
    /// Offset of the first record
    pub start: Option<u64>,
    /// 1-based page number; combined with `page_size` it derives start/limit
    pub page: Option<u64>,
    /// Page size; takes precedence over `limit` when set
    pub page_size: Option<u64>,
    /// SELECT DISTINCT
    pub distinct: bool,
    /// Read/write intent
    pub access: AccessMode,
    /// Opaque caller scope passed through untouched
    pub scope: Option<String>,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for a scoped context override.
///
/// Created by [`Context::scoped`]; the frame is removed when the guard
/// drops, whether the scope exits normally or by unwinding.
#[must_use = "the scope ends when this guard is dropped"]
#[derive(Debug)]
pub struct ContextScope {
    // !Send: frames live on the pushing thread's stack
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push this context as an override frame for the current thread.
    pub fn scoped(self) -> ContextScope {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(self));
        ContextScope {
            _not_send: std::marker::PhantomData,
        }
    }

    /// The ambient context: all active frames merged, innermost winning.
    pub fn current() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .fold(Context::new(), |acc, frame| acc.merged(frame))
        })
    }

    /// Merge `other` over this context, returning the combined value.
    ///
    /// Set fields of `other` win; `expand` and `columns` accumulate in
    /// order (outer first).
    pub fn merged(&self, other: &Context) -> Self {
        let mut out = self.clone();
        if other.locale.is_some() {
            out.locale.clone_from(&other.locale);
        }
        for path in &other.expand {
            if !out.expand.contains(path) {
                out.expand.push(path.clone());
            }
        }
        if !other.order.is_empty() {
            out.order.clone_from(&other.order);
        }
        for column in &other.columns {
            if !out.columns.contains(column) {
                out.columns.push(column.clone());
            }
        }
        if other.limit.is_some() {
            out.limit = other.limit;
        }
        if other.start.is_some() {
            out.start = other.start;
        }
        if other.page.is_some() {
            out.page = other.page;
        }
        if other.page_size.is_some() {
            out.page_size = other.page_size;
        }
        out.distinct |= other.distinct;
        if other.access == AccessMode::Write {
            out.access = AccessMode::Write;
        }
        if other.scope.is_some() {
            out.scope.clone_from(&other.scope);
        }
        out
    }

    /// Validate paging parameters.
    pub fn validate(&self) -> Result<()> {
        for (field, value, minimum) in [
            ("page", self.page, 1),
            ("page_size", self.page_size, 1),
            ("limit", self.limit, 1),
        ] {
            if let Some(v) = value {
                if v < minimum {
                    return Err(Error::Context(ContextError {
                        message: format!("{field} must be at least {minimum}, got {v}"),
                    }));
                }
            }
        }
        Ok(())
    }

    /// Effective row limit: the page size when paging, otherwise `limit`.
    pub fn effective_limit(&self) -> Option<u64> {
        self.page_size.or(self.limit)
    }

    /// Effective starting offset, derived from paging when present.
    pub fn effective_start(&self) -> Option<u64> {
        match self.page {
            Some(page) => Some((page - 1) * self.effective_limit().unwrap_or(0)),
            None => self.start,
        }
    }

    /// The locale to resolve I18n columns with.
    pub fn effective_locale(&self) -> &str {
        self.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }

    /// A copy of this context with every order term reversed.
    pub fn reversed(&self) -> Self {
        let mut out = self.clone();
        for clause in &mut out.order {
            clause.direction = clause.direction.reversed();
        }
        out
    }

    /// Builder: set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Builder: set ordering from typed clauses.
    pub fn with_order(mut self, order: Vec<OrderClause>) -> Self {
        self.order = order;
        self
    }

    /// Builder: parse ordering from `"+name,-age"` notation.
    pub fn with_order_text(mut self, text: &str) -> Self {
        self.order = parse_order(text);
        self
    }

    /// Builder: set expansion paths.
    pub fn with_expand(mut self, paths: Vec<String>) -> Self {
        self.expand = paths;
        self
    }

    /// Builder: parse expansion paths from `"a,b.c"` notation.
    pub fn with_expand_text(mut self, text: &str) -> Self {
        self.expand = parse_expand(text);
        self
    }

    /// Builder: set projection columns.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Builder: set a row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder: set a starting offset.
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder: select a page of results.
    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Builder: request distinct rows.
    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Builder: tag the operation as mutating.
    pub fn with_write_access(mut self) -> Self {
        self.access = AccessMode::Write;
        self
    }
}

/// Parse `"+first_name,-last_name"` ordering notation.
pub fn parse_order(text: &str) -> Vec<OrderClause> {
    text.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (direction, column) = match part.strip_prefix('-') {
                Some(rest) => (Direction::Desc, rest),
                None => (Direction::Asc, part.strip_prefix('+').unwrap_or(part)),
            };
            Some(OrderClause {
                column: column.to_string(),
                direction,
            })
        })
        .collect()
}

/// Parse `"user,group.name"` expansion notation.
pub fn parse_expand(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_parsing() {
        let order = parse_order("+first_name,-last_name");
        assert_eq!(order.len(), 2);
        assert_eq!(order[0], OrderClause::asc("first_name"));
        assert_eq!(order[1], OrderClause::desc("last_name"));
    }

    #[test]
    fn paging_math() {
        let ctx = Context::new().with_page(3, 25);
        assert_eq!(ctx.effective_limit(), Some(25));
        assert_eq!(ctx.effective_start(), Some(50));

        let ctx = Context::new().with_limit(10).with_start(5);
        assert_eq!(ctx.effective_limit(), Some(10));
        assert_eq!(ctx.effective_start(), Some(5));
    }

    #[test]
    fn paging_validation() {
        assert!(Context::new().with_page(0, 10).validate().is_err());
        assert!(Context::new().with_page(1, 10).validate().is_ok());
    }

    #[test]
    fn merge_innermost_wins() {
        let outer = Context::new().with_locale("en_US").with_limit(10);
        let inner = Context::new().with_locale("fr_FR");
        let merged = outer.merged(&inner);
        assert_eq!(merged.locale.as_deref(), Some("fr_FR"));
        assert_eq!(merged.limit, Some(10));
    }

    #[test]
    fn scoped_stack_restores_on_exit() {
        assert_eq!(Context::current().locale, None);
        {
            let _outer = Context::new().with_locale("fr_FR").scoped();
            assert_eq!(Context::current().locale.as_deref(), Some("fr_FR"));
            {
                let _inner = Context::new().with_locale("de_DE").scoped();
                assert_eq!(Context::current().locale.as_deref(), Some("de_DE"));
            }
            assert_eq!(Context::current().locale.as_deref(), Some("fr_FR"));
        }
        assert_eq!(Context::current().locale, None);
    }

    #[test]
    fn scoped_stack_restores_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = Context::new().with_locale("es_ES").scoped();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(Context::current().locale, None);
    }

    #[test]
    fn reversed_order() {
        let ctx = Context::new().with_order_text("+name,-age").reversed();
        assert_eq!(ctx.order[0], OrderClause::desc("name"));
        assert_eq!(ctx.order[1], OrderClause::asc("age"));
    }
}
