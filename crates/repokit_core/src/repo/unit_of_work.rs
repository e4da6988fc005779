//! Unit of work: one store transaction plus its identity map.
//!
//! # Responsibility
//! - Scope a logical operation to one SQLite transaction.
//! - Guarantee one managed instance per `(entity type, id)` while open.
//!
//! # Invariants
//! - Dropping a unit of work without `commit` rolls the transaction back.
//! - Rows loaded for an identity already in the map resolve to the existing
//!   instance; its in-memory state wins until `refresh` or `clear`.

use crate::db::{EntityStore, StoreResult};
use crate::model::entity::Entity;
use crate::repo::managed::Managed;
use log::{debug, error, info};
use rusqlite::{Connection, Transaction};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

type EntityMap<E> = HashMap<<E as Entity>::Id, Managed<E>>;

/// Per-type maps of managed instances.
#[derive(Default)]
struct IdentityMap {
    maps: HashMap<TypeId, Box<dyn Any>>,
}

impl IdentityMap {
    fn get<E: Entity>(&self) -> Option<&EntityMap<E>> {
        self.maps
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.as_ref().downcast_ref::<EntityMap<E>>())
    }

    fn get_mut<E: Entity>(&mut self) -> &mut EntityMap<E> {
        let slot = self
            .maps
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EntityMap::<E>::new()));
        match slot.as_mut().downcast_mut::<EntityMap<E>>() {
            Some(map) => map,
            None => unreachable!("identity map slots are keyed by entity type"),
        }
    }
}

/// Transaction-scoped context shared by every repository call of one
/// logical operation.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    identity: IdentityMap,
    counts: HashMap<TypeId, usize>,
    id: Uuid,
    started_at: Instant,
}

impl<'conn> UnitOfWork<'conn> {
    /// Opens a deferred transaction on `conn`.
    pub fn begin(conn: &'conn mut Connection) -> StoreResult<Self> {
        let tx = conn.transaction()?;
        let id = Uuid::new_v4();
        debug!("event=uow_begin module=repo status=ok uow_id={id}");
        Ok(Self {
            tx,
            identity: IdentityMap::default(),
            counts: HashMap::new(),
            id,
            started_at: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Store adapter bound to this unit of work's transaction.
    pub fn store(&self) -> EntityStore<'_> {
        EntityStore::new(&self.tx)
    }

    pub fn commit(self) -> StoreResult<()> {
        let managed = self.managed_count();
        let result = self.tx.commit();
        let duration_ms = self.started_at.elapsed().as_millis();
        match &result {
            Ok(()) => info!(
                "event=uow_commit module=repo status=ok uow_id={} managed={} duration_ms={}",
                self.id, managed, duration_ms
            ),
            Err(err) => error!(
                "event=uow_commit module=repo status=error uow_id={} duration_ms={} error={}",
                self.id, duration_ms, err
            ),
        }
        result.map_err(Into::into)
    }

    pub fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        info!(
            "event=uow_rollback module=repo status=ok uow_id={} duration_ms={}",
            self.id,
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Detaches every managed instance; later loads build fresh instances.
    pub fn clear(&mut self) {
        let dropped = self.managed_count();
        self.identity.maps.clear();
        self.counts.clear();
        debug!(
            "event=uow_clear module=repo status=ok uow_id={} dropped={}",
            self.id, dropped
        );
    }

    /// Removes one instance from the identity map. Returns whether it was managed.
    pub fn detach<E: Entity>(&mut self, entity: &Managed<E>) -> bool {
        let Some(id) = entity.borrow().id() else {
            return false;
        };
        if !self.contains(entity) {
            return false;
        }
        self.forget::<E>(&id);
        true
    }

    /// Whether this exact instance is the managed one for its identity.
    pub fn contains<E: Entity>(&self, entity: &Managed<E>) -> bool {
        let Some(id) = entity.borrow().id() else {
            return false;
        };
        self.lookup::<E>(&id)
            .is_some_and(|managed| managed.is_same(entity))
    }

    pub fn managed_count(&self) -> usize {
        self.counts.values().sum()
    }

    pub(crate) fn lookup<E: Entity>(&self, id: &E::Id) -> Option<Managed<E>> {
        self.identity.get::<E>().and_then(|map| map.get(id)).cloned()
    }

    /// Resolves a freshly loaded row against the identity map.
    ///
    /// Returns the already managed instance when one exists, otherwise
    /// registers `entity` as the managed instance.
    pub fn attach<E: Entity>(&mut self, entity: E) -> Managed<E> {
        let Some(id) = entity.id() else {
            return Managed::new(entity);
        };
        if let Some(existing) = self.lookup::<E>(&id) {
            return existing;
        }
        let handle = Managed::new(entity);
        self.register(id, handle.clone());
        handle
    }

    pub fn attach_all<E: Entity>(&mut self, entities: Vec<E>) -> Vec<Managed<E>> {
        entities
            .into_iter()
            .map(|entity| self.attach(entity))
            .collect()
    }

    /// Makes `handle` (or the instance already managed for `id`) the managed
    /// instance after a write. The written state is copied into an existing
    /// instance so earlier handles observe it.
    pub(crate) fn merge<E: Entity>(&mut self, id: E::Id, handle: Managed<E>) -> Managed<E> {
        match self.lookup::<E>(&id) {
            Some(existing) if existing.is_same(&handle) => existing,
            Some(existing) => {
                let state = handle.snapshot();
                existing.replace(state);
                existing
            }
            None => {
                self.register(id, handle.clone());
                handle
            }
        }
    }

    pub(crate) fn forget<E: Entity>(&mut self, id: &E::Id) {
        if self.identity.get_mut::<E>().remove(id).is_some() {
            if let Some(count) = self.counts.get_mut(&TypeId::of::<E>()) {
                *count = count.saturating_sub(1);
            }
        }
    }

    pub(crate) fn forget_all<E: Entity>(&mut self) {
        self.identity.maps.remove(&TypeId::of::<E>());
        self.counts.remove(&TypeId::of::<E>());
    }

    fn register<E: Entity>(&mut self, id: E::Id, handle: Managed<E>) {
        if self.identity.get_mut::<E>().insert(id, handle).is_none() {
            *self.counts.entry(TypeId::of::<E>()).or_insert(0) += 1;
        }
    }
}
