use async_trait::async_trait;
use indexmap::IndexMap;

use crate::backends::DatabaseValue;
use crate::event_error::EventError;
use crate::model::{Entity, Record};

/// Points in a record's lifecycle where observers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Saving,
    Creating,
    Updating,
    Deleting,
    Restoring,
    Created,
    Updated,
    Saved,
    Deleted,
    Restored,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Saving => "saving",
            LifecycleEvent::Creating => "creating",
            LifecycleEvent::Updating => "updating",
            LifecycleEvent::Deleting => "deleting",
            LifecycleEvent::Restoring => "restoring",
            LifecycleEvent::Created => "created",
            LifecycleEvent::Updated => "updated",
            LifecycleEvent::Saved => "saved",
            LifecycleEvent::Deleted => "deleted",
            LifecycleEvent::Restored => "restored",
        }
    }

    /// `*ing` events may cancel the operation
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Saving
                | LifecycleEvent::Creating
                | LifecycleEvent::Updating
                | LifecycleEvent::Deleting
                | LifecycleEvent::Restoring
        )
    }
}

/// Lifecycle hooks for records of `E`.
///
/// `*ing` hooks may mutate the record and return `Ok(false)` to cancel
/// the operation without an error; nothing is written in that case.
#[async_trait]
pub trait ModelObserver<E: Entity>: Send + Sync {
    async fn saving(&self, _record: &mut Record<E>) -> Result<bool, EventError> {
        Ok(true)
    }

    async fn creating(&self, _record: &mut Record<E>) -> Result<bool, EventError> {
        Ok(true)
    }

    async fn updating(&self, _record: &mut Record<E>) -> Result<bool, EventError> {
        Ok(true)
    }

    async fn deleting(&self, _record: &mut Record<E>) -> Result<bool, EventError> {
        Ok(true)
    }

    async fn restoring(&self, _record: &mut Record<E>) -> Result<bool, EventError> {
        Ok(true)
    }

    async fn created(&self, _record: &Record<E>) -> Result<(), EventError> {
        Ok(())
    }

    /// `changes` holds the dirty columns written, before `updated_at` was added
    async fn updated(
        &self,
        _record: &Record<E>,
        _changes: &IndexMap<String, DatabaseValue>,
    ) -> Result<(), EventError> {
        Ok(())
    }

    async fn saved(&self, _record: &Record<E>) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleted(&self, _record: &Record<E>) -> Result<(), EventError> {
        Ok(())
    }

    async fn restored(&self, _record: &Record<E>) -> Result<(), EventError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellable_events() {
        assert!(LifecycleEvent::Creating.is_cancellable());
        assert!(LifecycleEvent::Restoring.is_cancellable());
        assert!(!LifecycleEvent::Created.is_cancellable());
        assert_eq!(LifecycleEvent::Saved.name(), "saved");
    }
}
