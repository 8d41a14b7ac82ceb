//! In-memory catalog of installations and skill packages.
//!
//! Backed by `DashMap` for lock-free concurrent reads from the engine.
//! The register/remove surface is used by the CLI and the API glue; the
//! engine itself only ever reads.

use dashmap::DashMap;
use uuid::Uuid;

use skillrun_core::repository::catalog::CatalogRepository;
use skillrun_types::error::RepositoryError;
use skillrun_types::skill::{Installation, SkillDefinition};

/// Dashmap-backed `CatalogRepository` implementation.
#[derive(Default)]
pub struct InMemoryCatalog {
    installations: DashMap<Uuid, Installation>,
    skills: DashMap<Uuid, SkillDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a skill package.
    pub fn register_skill(&self, skill: SkillDefinition) {
        self.skills.insert(skill.skill_id, skill);
    }

    /// Register (or replace) an installation.
    pub fn register_installation(&self, installation: Installation) {
        self.installations
            .insert(installation.installation_id, installation);
    }

    /// Remove an installation. Returns `true` if it existed.
    pub fn remove_installation(&self, installation_id: &Uuid) -> bool {
        self.installations.remove(installation_id).is_some()
    }

    /// Number of registered installations.
    pub fn installation_count(&self) -> usize {
        self.installations.len()
    }
}

impl CatalogRepository for InMemoryCatalog {
    async fn get_installation(
        &self,
        installation_id: &Uuid,
    ) -> Result<Option<Installation>, RepositoryError> {
        Ok(self
            .installations
            .get(installation_id)
            .map(|entry| entry.value().clone()))
    }

    async fn get_skill(
        &self,
        skill_id: &Uuid,
    ) -> Result<Option<SkillDefinition>, RepositoryError> {
        Ok(self.skills.get(skill_id).map(|entry| entry.value().clone()))
    }
}
