//! Lazy, cached record collections.
//!
//! A collection is a declarative handle: model, filter and context. No
//! SQL runs until records or a count are asked for, and both are cached
//! on the instance afterwards. Refining operations return new
//! collections with fresh caches; [`Collection::invalidate`] drops the
//! caches in place.

use crate::record::{Expansion, Record};
use crate::store::Store;
use relmap_core::{
    CollectorKind, Context, Error, EventKind, RecordErrorKind, Result, Schema, Value,
};
use relmap_query::{Filter, Query};
use relmap_sql::{DeleteInput, StatementInput};
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Cache {
    records: Option<Vec<Record>>,
    count: Option<u64>,
}

/// A lazily evaluated set of records.
pub struct Collection {
    store: Store,
    model: Option<String>,
    filter: Filter,
    context: Context,
    cache: RefCell<Cache>,
}

impl Collection {
    pub(crate) fn new(store: Store, model: String, filter: Filter, context: Context) -> Self {
        Self {
            store,
            model: Some(model),
            filter,
            context,
            cache: RefCell::new(Cache::default()),
        }
    }

    /// A collection with no backing query: distinct from an empty
    /// result, it never touches the database.
    pub fn null(store: Store) -> Self {
        Self {
            store,
            model: None,
            filter: Filter::Null,
            context: Context::new(),
            cache: RefCell::new(Cache::default()),
        }
    }

    /// Whether this collection has no backing query.
    pub fn is_null(&self) -> bool {
        self.model.is_none()
    }

    /// Whether records are already cached on this instance.
    pub fn is_loaded(&self) -> bool {
        self.cache.borrow().records.is_some()
    }

    /// The filter this collection evaluates.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// A new collection with an additional filter ANDed in.
    pub fn refine(&self, filter: impl Into<Filter>) -> Self {
        Self {
            store: self.store.clone(),
            model: self.model.clone(),
            filter: self.filter.clone().and(filter),
            context: self.context.clone(),
            cache: RefCell::new(Cache::default()),
        }
    }

    /// A new collection with extra context merged over this one's.
    pub fn with_context(&self, context: Context) -> Self {
        Self {
            store: self.store.clone(),
            model: self.model.clone(),
            filter: self.filter.clone(),
            context: self.context.merged(&context),
            cache: RefCell::new(Cache::default()),
        }
    }

    /// A new collection iterating in the opposite order.
    pub fn reversed(&self) -> Self {
        Self {
            store: self.store.clone(),
            model: self.model.clone(),
            filter: self.filter.clone(),
            context: self.context.reversed(),
            cache: RefCell::new(Cache::default()),
        }
    }

    /// One page of this collection.
    pub fn page(&self, page: u64, page_size: u64) -> Self {
        self.with_context(Context::new().with_page(page, page_size))
    }

    /// Number of pages at the given page size.
    pub fn page_count(&self, page_size: u64) -> Result<u64> {
        if page_size == 0 {
            return Err(Error::config("page size must be at least 1"));
        }
        let count = self.count()?;
        Ok(count.div_ceil(page_size).max(1))
    }

    /// Drop cached records and counts.
    pub fn invalidate(&self) {
        *self.cache.borrow_mut() = Cache::default();
    }

    fn query_context(&self) -> Context {
        Context::current().merged(&self.context)
    }

    /// Number of matching records.
    ///
    /// Uses the loaded cache when present, a cached count otherwise, and
    /// compiles a COUNT select only on the first miss.
    pub fn count(&self) -> Result<u64> {
        let Some(model) = &self.model else {
            return Ok(0);
        };
        let context = self.query_context();
        {
            let cache = self.cache.borrow();
            if let Some(records) = &cache.records {
                return Ok(records.len() as u64);
            }
            if let Some(count) = cache.count {
                return Ok(count);
            }
        }
        let count = self.store.count_rows(model, &self.filter, &context)?;
        self.cache.borrow_mut().count = Some(count);
        Ok(count)
    }

    /// Whether no records match.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// The matching records, loading and caching them on first call.
    pub fn records(&self) -> Result<Vec<Record>> {
        let Some(model) = &self.model else {
            return Ok(Vec::new());
        };
        if let Some(records) = &self.cache.borrow().records {
            return Ok(records.clone());
        }
        let context = self.query_context();
        context.validate()?;
        let schema = self.store.schema(model)?;
        let rows = self.store.select_rows(model, &self.filter, &context)?;
        let mut records: Vec<Record> = rows
            .iter()
            .map(|row| Record::from_row(self.store.clone(), Arc::clone(&schema), row))
            .collect();
        expand_records(&self.store, &schema, &mut records, &context.expand)?;
        tracing::debug!(%model, records = records.len(), "collection loaded");

        let mut cache = self.cache.borrow_mut();
        // a limited load is not the whole set; keep count lazy then
        if context.effective_limit().is_none() {
            cache.count = Some(records.len() as u64);
        }
        cache.records = Some(records.clone());
        Ok(records)
    }

    /// The first matching record.
    pub fn first(&self) -> Result<Option<Record>> {
        if let Some(records) = &self.cache.borrow().records {
            return Ok(records.first().cloned());
        }
        let limited = self.with_context(Context::new().with_limit(1));
        Ok(limited.records()?.into_iter().next())
    }

    /// The last matching record, fetched through a reversed limit-1
    /// query when an ordering is present.
    pub fn last(&self) -> Result<Option<Record>> {
        if let Some(records) = &self.cache.borrow().records {
            return Ok(records.last().cloned());
        }
        if self.context.order.is_empty() {
            return Ok(self.records()?.into_iter().next_back());
        }
        self.reversed().first()
    }

    /// The record at an index; past-the-end indexes are an error.
    pub fn at(&self, index: usize) -> Result<Record> {
        let records = self.records()?;
        records.get(index).cloned().ok_or_else(|| {
            Error::record(
                RecordErrorKind::OutOfRange,
                format!("index {index} out of range for {} records", records.len()),
            )
        })
    }

    /// Position of a record in this collection, matched by identity.
    pub fn index_of(&self, record: &Record) -> Result<usize> {
        let id = record.id().cloned().ok_or_else(|| {
            Error::record(
                RecordErrorKind::Unsaved,
                "cannot locate a record that has no identity",
            )
        })?;
        self.records()?
            .iter()
            .position(|candidate| candidate.id() == Some(&id))
            .ok_or_else(|| {
                Error::record(
                    RecordErrorKind::NotFound,
                    format!("record {id} is not in this collection"),
                )
            })
    }

    /// The identity of every matching record.
    pub fn ids(&self) -> Result<Vec<Value>> {
        Ok(self
            .records()?
            .iter()
            .map(|record| record.id().cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// One column's value across every matching record.
    pub fn values(&self, column: &str) -> Result<Vec<Value>> {
        self.records()?
            .iter()
            .map(|record| record.get(column))
            .collect()
    }

    /// Save each record with pending changes and return how many were
    /// written.
    ///
    /// Records are value handles, so mutations made to the vector
    /// returned by [`Collection::records`] are pushed back through
    /// here. Per-record hooks and validation still run; vetoed or
    /// clean records are skipped. An empty slice saves nothing. The
    /// cache is refreshed from the saved records.
    pub fn save_all(&self, records: &mut [Record]) -> Result<u64> {
        let mut saved = 0;
        for record in records.iter_mut() {
            if record.is_modified() && record.save()? {
                saved += 1;
            }
        }
        if self.model.is_some() {
            self.cache.borrow_mut().records = Some(records.to_vec());
        }
        Ok(saved)
    }

    /// Delete every matching record in one statement.
    ///
    /// Pre-delete hooks run per record and vetoed records are skipped.
    /// An empty collection deletes nothing and issues no mutation.
    pub fn delete_all(&self) -> Result<u64> {
        let Some(model) = &self.model else {
            return Ok(0);
        };
        let schema = self.store.schema(model)?;
        let records = self.records()?;
        let mut ids = Vec::new();
        let mut kept = Vec::new();
        for record in &records {
            let Some(id) = record.id() else { continue };
            if self
                .store
                .hooks()
                .emit(EventKind::PreDelete, schema.name(), &record_values(record))
            {
                continue;
            }
            ids.push(id.clone());
            kept.push(record);
        }
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self.store.execute_write(
            relmap_sql::DELETE,
            &StatementInput::Delete(DeleteInput {
                schema: &schema,
                ids: &ids,
            }),
        )?;
        for record in kept {
            self.store
                .hooks()
                .emit(EventKind::PostDelete, schema.name(), &record_values(record));
        }
        self.invalidate();
        tracing::debug!(%model, deleted = result.affected, "collection delete");
        Ok(result.affected)
    }

    /// Serialize every matching record.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Array(
            self.records()?.iter().map(Record::to_json).collect(),
        ))
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.model)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

fn record_values(record: &Record) -> std::collections::BTreeMap<String, Value> {
    record
        .schema()
        .columns()
        .iter()
        .filter_map(|column| {
            record
                .get(column.name())
                .ok()
                .map(|value| (column.name().to_string(), value))
        })
        .collect()
}

/// Attach expanded relationships onto loaded records, one batched query
/// per relationship segment.
fn expand_records(
    store: &Store,
    schema: &Arc<Schema>,
    records: &mut [Record],
    paths: &[String],
) -> Result<()> {
    if records.is_empty() || paths.is_empty() {
        return Ok(());
    }
    // group nested paths under their first segment, keeping order
    let mut heads: Vec<(String, Vec<String>)> = Vec::new();
    for path in paths {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path.as_str(), None),
        };
        match heads.iter_mut().find(|(name, _)| name == head) {
            Some((_, nested)) => {
                if let Some(rest) = rest {
                    nested.push(rest.to_string());
                }
            }
            None => heads.push((
                head.to_string(),
                rest.map(|r| vec![r.to_string()]).into_iter().flatten().collect(),
            )),
        }
    }
    for (head, nested) in heads {
        expand_one(store, schema, records, &head, &nested)?;
    }
    Ok(())
}

fn expansion_context() -> Context {
    Context::new().with_locale(Context::current().effective_locale())
}

fn load_related(
    store: &Store,
    model: &str,
    filter: Filter,
    nested: &[String],
) -> Result<Vec<Record>> {
    let schema = store.schema(model)?;
    let context = expansion_context();
    let rows = store.select_rows(model, &filter, &context)?;
    let mut related: Vec<Record> = rows
        .iter()
        .map(|row| Record::from_row(store.clone(), Arc::clone(&schema), row))
        .collect();
    expand_records(store, &schema, &mut related, nested)?;
    Ok(related)
}

fn expand_one(
    store: &Store,
    schema: &Arc<Schema>,
    records: &mut [Record],
    name: &str,
    nested: &[String],
) -> Result<()> {
    if let Ok(column) = schema.column(name) {
        let Some(target) = column.kind().target() else {
            return Err(Error::config(format!(
                "column '{}.{name}' is not expandable",
                schema.name()
            )));
        };
        let mut ids: Vec<Value> = Vec::new();
        for record in records.iter() {
            let fk = record.get(name)?;
            if !fk.is_null() && !ids.contains(&fk) {
                ids.push(fk);
            }
        }
        let related = if ids.is_empty() {
            Vec::new()
        } else {
            let target_schema = store.schema(target)?;
            load_related(
                store,
                target,
                Query::new(target_schema.id_column().name()).is_in(ids).into(),
                nested,
            )?
        };
        for record in records.iter_mut() {
            let fk = record.get(name)?;
            let found = related
                .iter()
                .find(|candidate| candidate.id() == Some(&fk))
                .cloned();
            record.attach_expansion(name, Expansion::One(found.map(Box::new)));
        }
        return Ok(());
    }

    let collector = schema.collector(name)?;
    let root_ids: Vec<Value> = records
        .iter()
        .filter_map(|record| record.id().cloned())
        .collect();
    match collector.kind() {
        CollectorKind::Reverse { model, reference } => {
            let related = if root_ids.is_empty() {
                Vec::new()
            } else {
                load_related(
                    store,
                    model,
                    Query::new(reference).is_in(root_ids).into(),
                    nested,
                )?
            };
            for record in records.iter_mut() {
                let members: Vec<Record> = related
                    .iter()
                    .filter(|candidate| {
                        candidate
                            .get(reference)
                            .is_ok_and(|fk| record.id() == Some(&fk))
                    })
                    .cloned()
                    .collect();
                record.attach_expansion(name, Expansion::Many(members));
            }
        }
        CollectorKind::Through {
            through,
            source,
            target,
        } => {
            let through_schema = store.schema(through)?;
            let far_model = through_schema
                .column(target)?
                .kind()
                .target()
                .ok_or_else(|| {
                    Error::config(format!(
                        "through column '{through}.{target}' must be a reference"
                    ))
                })?
                .to_string();
            let links = if root_ids.is_empty() {
                Vec::new()
            } else {
                load_related(store, through, Query::new(source).is_in(root_ids).into(), &[])?
            };
            let mut far_ids: Vec<Value> = Vec::new();
            for link in &links {
                let fk = link.get(target)?;
                if !fk.is_null() && !far_ids.contains(&fk) {
                    far_ids.push(fk);
                }
            }
            let far_schema = store.schema(&far_model)?;
            let far_records = if far_ids.is_empty() {
                Vec::new()
            } else {
                load_related(
                    store,
                    &far_model,
                    Query::new(far_schema.id_column().name()).is_in(far_ids).into(),
                    nested,
                )?
            };
            for record in records.iter_mut() {
                let mut members = Vec::new();
                for link in &links {
                    if link.get(source).is_ok_and(|fk| record.id() == Some(&fk)) {
                        let far_fk = link.get(target)?;
                        if let Some(far) = far_records
                            .iter()
                            .find(|candidate| candidate.id() == Some(&far_fk))
                        {
                            members.push(far.clone());
                        }
                    }
                }
                record.attach_expansion(name, Expansion::Many(members));
            }
        }
    }
    Ok(())
}
