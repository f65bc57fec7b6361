use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::backends::DatabaseValue;
use crate::event_error::EventError;
use crate::events::{LifecycleEvent, ModelObserver};
use crate::model::{Entity, Record};

/// Ordered observer list for one entity type
pub struct ObserverRegistry<E: Entity> {
    observers: Vec<Arc<dyn ModelObserver<E>>>,
}

impl<E: Entity> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn register(&mut self, observer: Arc<dyn ModelObserver<E>>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Run a cancellable hook; `Ok(false)` as soon as one observer cancels
    pub async fn before(
        &self,
        event: LifecycleEvent,
        record: &mut Record<E>,
    ) -> Result<bool, EventError> {
        for observer in &self.observers {
            let proceed = match event {
                LifecycleEvent::Saving => observer.saving(record).await?,
                LifecycleEvent::Creating => observer.creating(record).await?,
                LifecycleEvent::Updating => observer.updating(record).await?,
                LifecycleEvent::Deleting => observer.deleting(record).await?,
                LifecycleEvent::Restoring => observer.restoring(record).await?,
                other => {
                    return Err(EventError::hook(
                        other.name(),
                        "not a cancellable event",
                    ))
                }
            };
            if !proceed {
                debug!("{} cancelled by '{}' hook", E::type_name(), event.name());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run a notification hook
    pub async fn after(&self, event: LifecycleEvent, record: &Record<E>) -> Result<(), EventError> {
        for observer in &self.observers {
            match event {
                LifecycleEvent::Created => observer.created(record).await?,
                LifecycleEvent::Saved => observer.saved(record).await?,
                LifecycleEvent::Deleted => observer.deleted(record).await?,
                LifecycleEvent::Restored => observer.restored(record).await?,
                LifecycleEvent::Updated => observer.updated(record, &IndexMap::new()).await?,
                other => {
                    return Err(EventError::hook(other.name(), "not a notification event"))
                }
            }
        }
        Ok(())
    }

    pub async fn updated(
        &self,
        record: &Record<E>,
        changes: &IndexMap<String, DatabaseValue>,
    ) -> Result<(), EventError> {
        for observer in &self.observers {
            observer.updated(record, changes).await?;
        }
        Ok(())
    }
}
