//! Common test utilities

use std::sync::Arc;

use roster::models::TeamMember;
use roster::random::SafeRandom;
use roster::storage::{DirectoryRepository, MemoryStore};
use roster::ReviewEngine;

/// Create a team member with a display name derived from the id
#[allow(dead_code)]
pub fn member(id: &str) -> TeamMember {
    TeamMember::new(id, format!("User {id}"))
}

/// Convert string literals to owned ids
#[allow(dead_code)]
pub fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|id| id.to_string()).collect()
}

/// Store holding team "backend" with active members u1..u4
#[allow(dead_code)]
pub async fn backend_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let members: Vec<TeamMember> = ["u1", "u2", "u3", "u4"].iter().map(|id| member(id)).collect();
    store.create_team("backend", &members).await.unwrap();
    store
}

/// Seeded engine over the given store
#[allow(dead_code)]
pub fn seeded_engine(store: Arc<MemoryStore>, seed: u64) -> ReviewEngine {
    ReviewEngine::from_store(store, SafeRandom::with_seed(seed))
}

/// Seeded engine over the "backend" fixture
#[allow(dead_code)]
pub async fn backend_engine(seed: u64) -> ReviewEngine {
    seeded_engine(backend_store().await, seed)
}
