//! Collectors: query-time relationship traversals.
//!
//! A collector stores no data of its own. It describes how to walk from
//! the owning model to a related model, either through a reverse
//! reference or through an intermediate join table.

/// A named relationship traversal on a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Collector {
    name: String,
    kind: CollectorKind,
}

/// The join shape of a collector.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorKind {
    /// Records of `model` whose `reference` column points back at the owner.
    Reverse {
        /// Related model name
        model: String,
        /// Reference column on the related model
        reference: String,
    },
    /// Many-to-many traversal through an intermediate model.
    ///
    /// The through model carries two reference columns: `source` points at
    /// the owning model, `target` points at the far side.
    Through {
        /// Intermediate model name
        through: String,
        /// Reference column on the through model pointing at the owner
        source: String,
        /// Reference column on the through model pointing at the far side
        target: String,
    },
}

impl Collector {
    /// Define a reverse-reference collector.
    pub fn reverse(
        name: impl Into<String>,
        model: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CollectorKind::Reverse {
                model: model.into(),
                reference: reference.into(),
            },
        }
    }

    /// Define a many-to-many "through" collector.
    pub fn through(
        name: impl Into<String>,
        through: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CollectorKind::Through {
                through: through.into(),
                source: source.into(),
                target: target.into(),
            },
        }
    }

    /// Collector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join shape.
    pub fn kind(&self) -> &CollectorKind {
        &self.kind
    }

    /// Check if this collector traverses a through model.
    pub const fn is_through(&self) -> bool {
        matches!(self.kind, CollectorKind::Through { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes() {
        let reverse = Collector::reverse("addresses", "Address", "user");
        assert!(!reverse.is_through());
        assert_eq!(reverse.name(), "addresses");

        let through = Collector::through("groups", "GroupUser", "user", "group");
        assert!(through.is_through());
        match through.kind() {
            CollectorKind::Through { through, source, target } => {
                assert_eq!(through, "GroupUser");
                assert_eq!(source, "user");
                assert_eq!(target, "group");
            }
            CollectorKind::Reverse { .. } => unreachable!(),
        }
    }
}
