//! Factory seam between the pool and the resource provider.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::BoxError;

/// Creates, validates, and destroys pooled resources for a
/// [`KeyedPool`](crate::KeyedPool).
///
/// The pool never constructs or releases a resource directly; every
/// lifecycle transition goes through the factory, so the factory is the
/// single place that talks to the underlying provider (a database
/// driver, a remote service client, and so on).
#[async_trait::async_trait]
pub trait KeyedFactory: Send + Sync + 'static {
    /// Key identifying a pool entry. Must be value-equal: two keys
    /// built from logically identical requests hash and compare equal.
    type Key: Eq + Hash + Clone + Debug + Send + Sync;

    /// The pooled resource type.
    type Resource: Send + Sync;

    /// Create a new resource for the given key.
    async fn create(&self, key: &Self::Key) -> Result<Self::Resource, BoxError>;

    /// Check that an idle resource is still usable before it is handed
    /// back out.
    ///
    /// This is a policy hook, not a correctness requirement; the
    /// default implementation accepts every resource.
    async fn validate(&self, key: &Self::Key, resource: &Self::Resource) -> bool {
        let _ = (key, resource);
        true
    }

    /// Release the resource's underlying provider state.
    ///
    /// Called for evicted, invalidated, and teardown-drained resources.
    /// Failures are collected by the caller rather than aborting a
    /// teardown in progress.
    async fn destroy(&self, key: &Self::Key, resource: Self::Resource) -> Result<(), BoxError>;
}

#[async_trait::async_trait]
impl<F: KeyedFactory> KeyedFactory for std::sync::Arc<F> {
    type Key = F::Key;
    type Resource = F::Resource;

    async fn create(&self, key: &Self::Key) -> Result<Self::Resource, BoxError> {
        (**self).create(key).await
    }

    async fn validate(&self, key: &Self::Key, resource: &Self::Resource) -> bool {
        (**self).validate(key, resource).await
    }

    async fn destroy(&self, key: &Self::Key, resource: Self::Resource) -> Result<(), BoxError> {
        (**self).destroy(key, resource).await
    }
}
