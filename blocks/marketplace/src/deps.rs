use std::sync::Arc;
use std::time::Duration;

use errand_atoms::cache::FastCache;
use errand_atoms::files::FileStore;
use errand_atoms::membership::{MembershipStore, MembershipTracker};
use errand_atoms::messages::NotificationSink;
use errand_atoms::participation::ParticipationStore;
use errand_atoms::tasks::TaskStore;
use errand_atoms::users::{UserBriefCache, UserProfiles};

/// Handles the managers are built from. Nothing is looked up globally; every
/// store, cache and collaborator arrives here.
#[derive(Clone)]
pub struct Dependencies {
    pub tasks: Arc<dyn TaskStore>,
    pub participations: Arc<dyn ParticipationStore>,
    pub memberships: MembershipTracker,
    pub briefs: UserBriefCache,
    pub files: Arc<dyn FileStore>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Dependencies {
    /// Wires every store seam to one Durable Store handle.
    pub fn new<S>(
        store: Arc<S>,
        cache: Arc<dyn FastCache>,
        profiles: Arc<dyn UserProfiles>,
        files: Arc<dyn FileStore>,
        notifications: Arc<dyn NotificationSink>,
        brief_ttl: Duration,
    ) -> Self
    where
        S: TaskStore + ParticipationStore + MembershipStore + 'static,
    {
        let memberships: Arc<dyn MembershipStore> = store.clone();
        Self {
            tasks: store.clone(),
            participations: store,
            memberships: MembershipTracker::new(memberships, cache.clone()),
            briefs: UserBriefCache::new(profiles, cache, brief_ttl),
            files,
            notifications,
        }
    }
}
