//! Shared handle to a managed entity instance.

use serde::{Serialize, Serializer};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Handle to an entity instance; clones point at the same instance.
///
/// Inside one unit of work every load of the same identity yields a handle to
/// the same instance, so `a.is_same(&b)` holds for both.
pub struct Managed<E>(Rc<RefCell<E>>);

impl<E> Managed<E> {
    pub fn new(entity: E) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    /// # Panics
    /// Panics if the instance is currently borrowed mutably.
    pub fn borrow(&self) -> Ref<'_, E> {
        self.0.borrow()
    }

    /// # Panics
    /// Panics if the instance is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.0.borrow_mut()
    }

    /// Identity comparison, not value comparison.
    pub fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Swaps in new state, keeping the instance.
    pub fn replace(&self, entity: E) -> E {
        self.0.replace(entity)
    }
}

impl<E: Clone> Managed<E> {
    /// Detached copy of the current state.
    pub fn snapshot(&self) -> E {
        self.0.borrow().clone()
    }
}

impl<E> Clone for Managed<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> From<E> for Managed<E> {
    fn from(entity: E) -> Self {
        Self::new(entity)
    }
}

impl<E: PartialEq> PartialEq for Managed<E> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl<E: Debug> Debug for Managed<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Managed").field(&*self.0.borrow()).finish()
    }
}

impl<E: Serialize> Serialize for Managed<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.borrow().serialize(serializer)
    }
}
