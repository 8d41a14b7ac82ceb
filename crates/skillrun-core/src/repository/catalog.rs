//! Catalog repository trait: installations and skill packages.
//!
//! The engine only ever reads the catalog; installation lifecycle and
//! package metadata CRUD belong to the surrounding product.

use skillrun_types::error::RepositoryError;
use skillrun_types::skill::{Installation, SkillDefinition};
use uuid::Uuid;

/// Read access to installations and their skill packages.
pub trait CatalogRepository: Send + Sync {
    /// Fetch an installation descriptor by ID.
    fn get_installation(
        &self,
        installation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Installation>, RepositoryError>> + Send;

    /// Fetch a skill package by ID.
    fn get_skill(
        &self,
        skill_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SkillDefinition>, RepositoryError>> + Send;
}
