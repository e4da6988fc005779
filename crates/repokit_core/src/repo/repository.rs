//! Generic repository facade.
//!
//! # Responsibility
//! - Provide CRUD, paging, bulk update and derived finders for one entity type.
//! - Route every loaded row through the unit of work's identity map.
//! - Carry a custom fragment composed in at construction.
//!
//! # Invariants
//! - `save` assigns an identifier to new entities and returns the managed
//!   instance for that identifier.
//! - `find_all` without a sort returns rows in identifier order.
//! - Bulk updates bypass the identity map; managed instances stay stale until
//!   `refresh` or `UnitOfWork::clear`.

use crate::config::{MissingDeletePolicy, RepositoryConfig};
use crate::db::{BoundQuery, LockMode};
use crate::model::entity::{Entity, EntityId};
use crate::page::{build_page, build_slice, Page, PageRequest, Slice};
use crate::query::{
    Assignment, DerivedQuery, Operand, Predicate, QueryBuilder, QueryError, Sort, Subject,
};
use crate::repo::managed::Managed;
use crate::repo::shape::{Many, ResultShape};
use crate::repo::unit_of_work::UnitOfWork;
use crate::repo::{RepoError, RepoResult};
use log::{debug, info, warn};
use rusqlite::Row;
use std::marker::PhantomData;
use std::time::Instant;

/// Placeholder fragment for repositories without hand-written queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoFragment;

/// Per-finder execution hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryHints {
    /// Results are detached copies and never enter the identity map.
    pub read_only: bool,
    pub lock: LockMode,
}

/// Read-only view type filled from a subset of an entity's fields.
///
/// `fields()` names entity fields; each is selected under its field name, so
/// `from_row` reads columns by field name.
pub trait Projection: Sized {
    fn fields() -> &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Row-returning derived finder, validated when the repository builds it.
#[derive(Debug, Clone)]
pub struct Finder<E, S> {
    query: DerivedQuery,
    hints: QueryHints,
    _marker: PhantomData<fn() -> (E, S)>,
}

impl<E, S> Finder<E, S> {
    pub fn descriptor(&self) -> &str {
        self.query.descriptor()
    }

    pub fn query(&self) -> &DerivedQuery {
        &self.query
    }

    pub fn hints(&self) -> QueryHints {
        self.hints
    }

    pub fn read_only(mut self) -> Self {
        self.hints.read_only = true;
        self
    }

    pub fn lock(mut self, lock: LockMode) -> Self {
        self.hints.lock = lock;
        self
    }
}

/// `count...By` / `exists...By` derived query.
#[derive(Debug, Clone)]
pub struct Counter<E> {
    query: DerivedQuery,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Counter<E> {
    pub fn descriptor(&self) -> &str {
        self.query.descriptor()
    }

    pub fn query(&self) -> &DerivedQuery {
        &self.query
    }
}

/// Filter, ordering and hints shared by paged and sliced reads.
struct Window<'a> {
    predicates: &'a [Predicate],
    sort: Sort,
    distinct: bool,
    hints: QueryHints,
}

impl<'a> Window<'a> {
    fn plain(predicates: &'a [Predicate]) -> Self {
        Self {
            predicates,
            sort: Sort::unsorted(),
            distinct: false,
            hints: QueryHints::default(),
        }
    }

    fn derived<E, S>(finder: &Finder<E, S>, predicates: &'a [Predicate]) -> Self {
        Self {
            predicates,
            sort: finder.query().sort().clone(),
            distinct: finder.query().is_distinct(),
            hints: finder.hints(),
        }
    }

    /// Descriptor ordering first, then the request's sort keys.
    fn select(
        &self,
        builder: &QueryBuilder,
        request: &PageRequest,
        fetch: u64,
    ) -> Result<BoundQuery, QueryError> {
        builder
            .select()
            .filter(self.predicates)
            .sort(&self.sort)
            .sort(request.sort())
            .distinct(self.distinct)
            .lock(self.hints.lock)
            .limit(fetch)
            .offset(request.offset())
            .build()
    }
}

/// Repository for entity type `E` with custom fragment `C`.
#[derive(Debug, Clone)]
pub struct Repository<E, C = NoFragment> {
    config: RepositoryConfig,
    builder: QueryBuilder,
    fragment: C,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E, NoFragment> {
    pub fn new(config: RepositoryConfig) -> Self {
        info!(
            "event=repo_init module=repo status=ok entity={} table={}",
            E::meta().name,
            E::meta().table
        );
        Self {
            config,
            builder: QueryBuilder::new(E::meta()),
            fragment: NoFragment,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity, C> Repository<E, C> {
    /// Composes a hand-written query fragment into this repository.
    pub fn with_fragment<F>(self, fragment: F) -> Repository<E, F> {
        Repository {
            config: self.config,
            builder: self.builder,
            fragment,
            _entity: PhantomData,
        }
    }

    pub fn fragment(&self) -> &C {
        &self.fragment
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Parses a `find...By` descriptor into a finder of shape `S`.
    ///
    /// # Errors
    /// - `InvalidField` / `MalformedDescriptor` from parsing.
    /// - `MalformedDescriptor` when the descriptor is a count or exists query.
    pub fn finder<S: ResultShape>(&self, descriptor: &str) -> RepoResult<Finder<E, S>> {
        let query = DerivedQuery::parse(descriptor, E::meta())?;
        if query.subject() != Subject::Find {
            return Err(QueryError::MalformedDescriptor {
                descriptor: descriptor.to_string(),
                reason: "count/exists descriptors build a counter, not a finder".to_string(),
            }
            .into());
        }
        Ok(Finder {
            query,
            hints: QueryHints::default(),
            _marker: PhantomData,
        })
    }

    /// Parses a `count...By` or `exists...By` descriptor.
    pub fn counter(&self, descriptor: &str) -> RepoResult<Counter<E>> {
        let query = DerivedQuery::parse(descriptor, E::meta())?;
        if query.subject() == Subject::Find {
            return Err(QueryError::MalformedDescriptor {
                descriptor: descriptor.to_string(),
                reason: "find descriptors build a finder, not a counter".to_string(),
            }
            .into());
        }
        Ok(Counter {
            query,
            _marker: PhantomData,
        })
    }

    /// Inserts a new entity or updates an existing one.
    ///
    /// An entity without identifier is inserted and receives one. An entity
    /// with an identifier is updated; when no row matches, it is inserted
    /// under that identifier. The returned handle is the managed instance for
    /// the identifier, which may differ from the handle passed in.
    pub fn save(
        &self,
        uow: &mut UnitOfWork<'_>,
        entity: impl Into<Managed<E>>,
    ) -> RepoResult<Managed<E>> {
        let started_at = Instant::now();
        let handle = entity.into();
        let current_id = handle.borrow().id();

        let (id, op) = match current_id {
            None => (self.insert(uow, &handle, None)?, "insert"),
            Some(id) => {
                let values = handle.borrow().field_values();
                let changed = uow
                    .store()
                    .execute_update(&self.builder.update_by_id(id.to_value(), values))?;
                if changed == 0 {
                    self.insert(uow, &handle, Some(id.clone()))?;
                    (id, "insert_with_id")
                } else {
                    (id, "update")
                }
            }
        };

        debug!(
            "event=entity_save module=repo status=ok entity={} op={} duration_ms={}",
            E::meta().name,
            op,
            started_at.elapsed().as_millis()
        );
        Ok(uow.merge(id, handle))
    }

    pub fn save_all<I>(&self, uow: &mut UnitOfWork<'_>, entities: I) -> RepoResult<Vec<Managed<E>>>
    where
        I: IntoIterator,
        I::Item: Into<Managed<E>>,
    {
        entities
            .into_iter()
            .map(|entity| self.save(uow, entity))
            .collect()
    }

    pub fn find_by_id(
        &self,
        uow: &mut UnitOfWork<'_>,
        id: &E::Id,
    ) -> RepoResult<Option<Managed<E>>> {
        if let Some(managed) = uow.lookup::<E>(id) {
            return Ok(Some(managed));
        }
        let rows = self.load(uow, &self.builder.select_by_id(id.to_value()), false)?;
        Ok(rows.into_iter().next())
    }

    pub fn exists_by_id(&self, uow: &mut UnitOfWork<'_>, id: &E::Id) -> RepoResult<bool> {
        let id_field = E::meta().id.name;
        let query = self
            .builder
            .exists(&[Predicate::eq(id_field, id.to_value())])?;
        Ok(uow.store().execute_count(&query)? > 0)
    }

    /// Every row, in identifier order.
    pub fn find_all(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<E>>> {
        self.find_all_sorted(uow, &Sort::asc(E::meta().id.name))
    }

    pub fn find_all_sorted(
        &self,
        uow: &mut UnitOfWork<'_>,
        sort: &Sort,
    ) -> RepoResult<Vec<Managed<E>>> {
        self.find_where(uow, &[], sort)
    }

    /// Rows whose identifier is in `ids`; unknown ids are skipped.
    pub fn find_all_by_id(
        &self,
        uow: &mut UnitOfWork<'_>,
        ids: &[E::Id],
    ) -> RepoResult<Vec<Managed<E>>> {
        let id_field = E::meta().id.name;
        let predicate = Predicate::is_in(
            id_field,
            Operand::List(ids.iter().map(EntityId::to_value).collect()),
        );
        self.find_where(uow, &[predicate], &Sort::asc(id_field))
    }

    pub fn count(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<u64> {
        self.count_where(uow, &[])
    }

    /// Deletes the row of `entity`. A transient entity counts as missing.
    pub fn delete(&self, uow: &mut UnitOfWork<'_>, entity: &Managed<E>) -> RepoResult<()> {
        let id = entity.borrow().id();
        match id {
            Some(id) => self.delete_by_id(uow, &id),
            None => self.on_missing(None),
        }
    }

    pub fn delete_by_id(&self, uow: &mut UnitOfWork<'_>, id: &E::Id) -> RepoResult<()> {
        let removed = uow
            .store()
            .execute_update(&self.builder.delete_by_id(id.to_value()))?;
        uow.forget::<E>(id);
        if removed == 0 {
            return self.on_missing(Some(id));
        }
        debug!(
            "event=entity_delete module=repo status=ok entity={} id={}",
            E::meta().name,
            id
        );
        Ok(())
    }

    /// Deletes every row and detaches the managed instances of this type.
    pub fn delete_all(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<usize> {
        let removed = uow.store().execute_update(&self.builder.delete_all())?;
        uow.forget_all::<E>();
        info!(
            "event=entity_delete_all module=repo status=ok entity={} rows={}",
            E::meta().name,
            removed
        );
        Ok(removed)
    }

    /// Reloads the row into the existing instance, discarding unsaved changes.
    ///
    /// # Errors
    /// - `NotFound` when the entity is transient or its row is gone.
    pub fn refresh(&self, uow: &mut UnitOfWork<'_>, entity: &Managed<E>) -> RepoResult<()> {
        let id = entity.borrow().id().ok_or_else(|| RepoError::NotFound {
            entity: E::meta().name,
            id: "<transient>".to_string(),
        })?;
        let mut rows = uow
            .store()
            .execute(&self.builder.select_by_id(id.to_value()), E::from_row)?;
        let Some(fresh) = rows.pop() else {
            uow.forget::<E>(&id);
            return Err(RepoError::NotFound {
                entity: E::meta().name,
                id: id.to_string(),
            });
        };
        entity.replace(fresh);
        uow.merge(id, entity.clone());
        Ok(())
    }

    /// Rows matching every predicate.
    pub fn find_where(
        &self,
        uow: &mut UnitOfWork<'_>,
        predicates: &[Predicate],
        sort: &Sort,
    ) -> RepoResult<Vec<Managed<E>>> {
        let query = self.builder.select().filter(predicates).sort(sort).build()?;
        self.load(uow, &query, false)
    }

    pub fn count_where(&self, uow: &mut UnitOfWork<'_>, predicates: &[Predicate]) -> RepoResult<u64> {
        Ok(uow.store().execute_count(&self.builder.count(predicates)?)?)
    }

    /// One page of matching rows plus the total match count.
    pub fn find_page(
        &self,
        uow: &mut UnitOfWork<'_>,
        predicates: &[Predicate],
        request: &PageRequest,
    ) -> RepoResult<Page<Managed<E>>> {
        self.page_with(uow, &Window::plain(predicates), request)
    }

    /// One window of matching rows; fetches one extra row instead of counting.
    pub fn find_slice(
        &self,
        uow: &mut UnitOfWork<'_>,
        predicates: &[Predicate],
        request: &PageRequest,
    ) -> RepoResult<Slice<Managed<E>>> {
        self.slice_with(uow, &Window::plain(predicates), request)
    }

    /// Direct `UPDATE` of every matching row. Returns the affected-row count.
    pub fn bulk_update(
        &self,
        uow: &mut UnitOfWork<'_>,
        predicates: &[Predicate],
        assignments: &[Assignment],
    ) -> RepoResult<usize> {
        let query = self.builder.bulk_update(predicates, assignments)?;
        let updated = uow.store().execute_update(&query)?;
        if self.config.clear_after_bulk_update {
            uow.clear();
        } else if uow.managed_count() > 0 {
            debug!(
                "event=bulk_update_stale module=repo status=ok entity={} managed={}",
                E::meta().name,
                uow.managed_count()
            );
        }
        info!(
            "event=bulk_update module=repo status=ok entity={} rows={}",
            E::meta().name,
            updated
        );
        Ok(updated)
    }

    /// Matching rows mapped into projection `P`; projections are never managed.
    pub fn find_projected<P: Projection>(
        &self,
        uow: &mut UnitOfWork<'_>,
        predicates: &[Predicate],
        sort: &Sort,
    ) -> RepoResult<Vec<P>> {
        let query = self
            .builder
            .select()
            .project(P::fields())
            .filter(predicates)
            .sort(sort)
            .build()?;
        Ok(uow.store().execute(&query, P::from_row)?)
    }

    /// Runs hand-written SQL whose rows map through `E::from_row`.
    pub fn find_native(
        &self,
        uow: &mut UnitOfWork<'_>,
        query: &BoundQuery,
    ) -> RepoResult<Vec<Managed<E>>> {
        self.load(uow, query, false)
    }

    /// Executes a derived finder with one argument per criterion.
    pub fn find_by<S: ResultShape>(
        &self,
        uow: &mut UnitOfWork<'_>,
        finder: &Finder<E, S>,
        args: Vec<Operand>,
    ) -> RepoResult<S::Output<Managed<E>>> {
        let derived = finder.query();
        let predicates = derived.bind(args)?;
        let limit = match (derived.limit(), S::FETCH_LIMIT) {
            (Some(own), Some(shape)) => Some(own.min(shape)),
            (own, shape) => own.or(shape),
        };

        let mut select = self
            .builder
            .select()
            .filter(&predicates)
            .sort(derived.sort())
            .distinct(derived.is_distinct())
            .lock(finder.hints().lock);
        if let Some(limit) = limit {
            select = select.limit(limit);
        }
        let rows = self.load(uow, &select.build()?, finder.hints().read_only)?;
        S::collect(rows, finder.descriptor()).inspect_err(|err| {
            warn!(
                "event=derived_query module=repo status=error descriptor={} error={}",
                finder.descriptor(),
                err
            );
        })
    }

    /// Paged derived finder. The request sort follows the descriptor's
    /// `OrderBy` keys; a `TopN` limit does not apply to paged calls.
    pub fn find_page_by(
        &self,
        uow: &mut UnitOfWork<'_>,
        finder: &Finder<E, Many>,
        args: Vec<Operand>,
        request: &PageRequest,
    ) -> RepoResult<Page<Managed<E>>> {
        let predicates = finder.query().bind(args)?;
        self.page_with(uow, &Window::derived(finder, &predicates), request)
    }

    pub fn find_slice_by(
        &self,
        uow: &mut UnitOfWork<'_>,
        finder: &Finder<E, Many>,
        args: Vec<Operand>,
        request: &PageRequest,
    ) -> RepoResult<Slice<Managed<E>>> {
        let predicates = finder.query().bind(args)?;
        self.slice_with(uow, &Window::derived(finder, &predicates), request)
    }

    pub fn count_by(
        &self,
        uow: &mut UnitOfWork<'_>,
        counter: &Counter<E>,
        args: Vec<Operand>,
    ) -> RepoResult<u64> {
        expect_subject(counter, Subject::Count)?;
        let predicates = counter.query().bind(args)?;
        self.count_where(uow, &predicates)
    }

    pub fn exists_by(
        &self,
        uow: &mut UnitOfWork<'_>,
        counter: &Counter<E>,
        args: Vec<Operand>,
    ) -> RepoResult<bool> {
        expect_subject(counter, Subject::Exists)?;
        let predicates = counter.query().bind(args)?;
        let query = self.builder.exists(&predicates)?;
        Ok(uow.store().execute_count(&query)? > 0)
    }

    fn page_with(
        &self,
        uow: &mut UnitOfWork<'_>,
        window: &Window<'_>,
        request: &PageRequest,
    ) -> RepoResult<Page<Managed<E>>> {
        self.check_page_size(request)?;
        let query = window.select(&self.builder, request, request.size())?;
        let content = self.load(uow, &query, window.hints.read_only)?;
        let total = self.count_where(uow, window.predicates)?;
        Ok(build_page(content, total, request))
    }

    fn slice_with(
        &self,
        uow: &mut UnitOfWork<'_>,
        window: &Window<'_>,
        request: &PageRequest,
    ) -> RepoResult<Slice<Managed<E>>> {
        self.check_page_size(request)?;
        let fetch = request.size().saturating_add(1);
        let query = window.select(&self.builder, request, fetch)?;
        let rows = self.load(uow, &query, window.hints.read_only)?;
        Ok(build_slice(rows, request))
    }

    fn check_page_size(&self, request: &PageRequest) -> RepoResult<()> {
        if request.size() > self.config.max_page_size {
            return Err(QueryError::InvalidPageRequest(format!(
                "page size {} exceeds the maximum of {}",
                request.size(),
                self.config.max_page_size
            ))
            .into());
        }
        Ok(())
    }

    fn load(
        &self,
        uow: &mut UnitOfWork<'_>,
        query: &BoundQuery,
        read_only: bool,
    ) -> RepoResult<Vec<Managed<E>>> {
        let rows = uow.store().execute(query, E::from_row)?;
        if read_only {
            return Ok(rows.into_iter().map(Managed::new).collect());
        }
        Ok(uow.attach_all(rows))
    }

    fn insert(
        &self,
        uow: &mut UnitOfWork<'_>,
        handle: &Managed<E>,
        id: Option<E::Id>,
    ) -> RepoResult<E::Id> {
        let client_id = id.or_else(E::Id::generate);
        let values = handle.borrow().field_values();
        let query = self
            .builder
            .insert(client_id.as_ref().map(EntityId::to_value), values);
        let rowid = uow.store().execute_insert(&query)?;

        let id = match client_id {
            Some(id) => id,
            None => E::Id::from_rowid(rowid).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "{} has no identifier strategy for new rows",
                    E::meta().name
                ))
            })?,
        };
        if handle.borrow().id().is_none() {
            handle.borrow_mut().assign_id(id.clone());
        }
        Ok(id)
    }

    fn on_missing(&self, id: Option<&E::Id>) -> RepoResult<()> {
        let id = id.map_or_else(|| "<transient>".to_string(), ToString::to_string);
        match self.config.on_missing_delete {
            MissingDeletePolicy::Noop => {
                debug!(
                    "event=entity_delete module=repo status=ok entity={} id={} missing=true",
                    E::meta().name,
                    id
                );
                Ok(())
            }
            MissingDeletePolicy::Error => Err(RepoError::NotFound {
                entity: E::meta().name,
                id,
            }),
        }
    }
}

fn expect_subject<E>(counter: &Counter<E>, subject: Subject) -> Result<(), QueryError> {
    if counter.query().subject() == subject {
        return Ok(());
    }
    Err(QueryError::MalformedDescriptor {
        descriptor: counter.descriptor().to_string(),
        reason: format!("expected a {subject:?} descriptor"),
    })
}
