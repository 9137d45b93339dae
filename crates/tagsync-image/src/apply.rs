//! Tag application (real or simulated)

use crate::error::{ReconcileError, RegistryError};
use crate::registry::Registry;
use crate::types::{ImageHandle, ImageReference};
use serde::Serialize;
use std::collections::HashMap;
use tagsync_core::retry::{ClosurePredicate, RetryExecutor, TracingObserver};
use tagsync_core::types::RetryPolicy;
use tracing::info;

/// A tag write performed or simulated during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAction {
    /// Digest-qualified source in the base repository
    pub source: String,
    /// Tag-qualified destination
    pub destination: String,
    /// Whether the write was only simulated
    pub dry_run: bool,
}

/// Creates destination tags from source digests
pub struct TagApplier<'a, R: ?Sized> {
    registry: &'a R,
    push_retry: RetryPolicy,
    pulled: HashMap<ImageReference, ImageHandle>,
    actions: Vec<TagAction>,
}

impl<'a, R: Registry + ?Sized> TagApplier<'a, R> {
    pub fn new(registry: &'a R, push_retry: RetryPolicy) -> Self {
        Self {
            registry,
            push_retry,
            pulled: HashMap::new(),
            actions: Vec::new(),
        }
    }

    /// Point `destination` at `source`
    ///
    /// With `dry_run` nothing is sent to any registry; the planned write is
    /// logged and recorded.
    pub async fn apply(
        &mut self,
        source: &ImageReference,
        destination: &ImageReference,
        dry_run: bool,
    ) -> Result<(), ReconcileError> {
        if dry_run {
            info!("Would have tagged {} with {}", source, destination);
            self.record(source, destination, true);
            return Ok(());
        }

        info!("Tagging {} with {}", source, destination);

        let handle = self.pull(source, destination).await?;
        let handle = &handle;
        let registry = self.registry;

        RetryExecutor::new(self.push_retry.clone())
            .with_predicate(ClosurePredicate::new(RegistryError::is_transient))
            .with_observer(TracingObserver::new(format!("push {}", destination)))
            .execute(move || registry.push(destination, handle))
            .await
            .map_err(|e| ReconcileError::PushRejected {
                source_image: source.to_string(),
                destination: destination.to_string(),
                reason: e.to_string(),
            })?;

        self.record(source, destination, false);
        Ok(())
    }

    /// Writes performed or simulated so far, in order
    pub fn actions(&self) -> &[TagAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<TagAction> {
        self.actions
    }

    async fn pull(
        &mut self,
        source: &ImageReference,
        destination: &ImageReference,
    ) -> Result<ImageHandle, ReconcileError> {
        if let Some(handle) = self.pulled.get(source) {
            return Ok(handle.clone());
        }

        let handle = self
            .registry
            .pull(source)
            .await
            .map_err(|e| ReconcileError::SourceNotFound {
                source_image: source.to_string(),
                destination: destination.to_string(),
                reason: e.to_string(),
            })?;

        self.pulled.insert(source.clone(), handle.clone());
        Ok(handle)
    }

    fn record(&mut self, source: &ImageReference, destination: &ImageReference, dry_run: bool) {
        self.actions.push(TagAction {
            source: source.to_string(),
            destination: destination.to_string(),
            dry_run,
        });
    }
}
