//! Collaborator traits implemented by transports
//!
//! The controller only talks to these seams; `expensedesk-client` provides the
//! HTTP implementation and tests plug in scripted fakes.

use crate::error::CoreResult;
use crate::models::{Credentials, PageResult, User};
use crate::query::PageQuery;
use async_trait::async_trait;
use std::sync::Arc;

/// Paged reads and mutations of one collection
#[async_trait]
pub trait CollectionClient: Send + Sync {
    /// Row type of the collection
    type Record: Clone + Send + Sync + 'static;
    /// Create/update payload
    type Draft: Send + Sync;

    /// Read one page
    async fn fetch(&self, query: &PageQuery) -> CoreResult<PageResult<Self::Record>>;

    async fn get(&self, id: i64) -> CoreResult<Self::Record>;

    async fn create(&self, draft: &Self::Draft) -> CoreResult<Self::Record>;

    async fn update(&self, id: i64, draft: &Self::Draft) -> CoreResult<Self::Record>;

    async fn delete(&self, id: i64) -> CoreResult<()>;
}

/// Authentication against the backend
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Exchange credentials for a session; later calls carry it
    async fn login(&self, credentials: &Credentials) -> CoreResult<()>;

    /// End the backend session and forget it locally
    async fn logout(&self) -> CoreResult<()>;

    /// Identity of the authenticated caller
    async fn current_user(&self) -> CoreResult<User>;
}

/// Shared account client reference
pub type AccountRef = Arc<dyn AccountClient>;

