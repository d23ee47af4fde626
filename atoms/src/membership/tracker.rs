//! Membership Set Tracker: cache-aside view of each user's liked / collected
//! sets.
//!
//! Reads answer from the cache set `{kind}:{user_id}`, loading the whole set
//! from the Durable Store on a miss. Writes go to the Durable Store first and
//! then drop the cache key; the next read repopulates it.
//!
//! Loaded sets carry no expiry, so a load that raced a write must not stick:
//! after `SADD` the store is read again and the key dropped if the set moved.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::model::SetKind;
use super::store::MembershipStore;
use crate::cache::FastCache;
use crate::error::{Error, Result};

/// Extra member written with every loaded set so an empty set still
/// occupies the key. Target ids never take this form.
const EMPTY_SET_MARKER: &str = "__loaded__";

#[derive(Clone)]
pub struct MembershipTracker {
    store: Arc<dyn MembershipStore>,
    cache: Arc<dyn FastCache>,
}

impl MembershipTracker {
    pub fn new(store: Arc<dyn MembershipStore>, cache: Arc<dyn FastCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache_key(user_id: &str, kind: SetKind) -> String {
        format!("{}:{}", kind.cache_prefix(), user_id)
    }

    pub async fn is_member(&self, user_id: &str, target_id: &str, kind: SetKind) -> Result<bool> {
        if target_id == EMPTY_SET_MARKER {
            return Ok(false);
        }
        let key = Self::cache_key(user_id, kind);

        match self.cached_membership(&key, target_id).await {
            Ok(Some(member)) => return Ok(member),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%key, error = %e, "membership cache unavailable, reading store");
                return Ok(self.load_members(user_id, kind).await?.contains(target_id));
            }
        }

        let members = self.load_members(user_id, kind).await?;
        let member = members.contains(target_id);
        if let Err(e) = self.populate(&key, members.clone()).await {
            tracing::warn!(%key, error = %e, "failed to populate membership cache");
            return Ok(member);
        }
        self.discard_if_moved(&key, user_id, kind, &members).await;
        Ok(member)
    }

    /// Adds `target_id`; `Conflict` when it is already a member.
    pub async fn add(&self, user_id: &str, target_id: &str, kind: SetKind) -> Result<()> {
        reject_marker(target_id)?;
        if !self.store.add_member(user_id, kind, target_id).await? {
            return Err(Error::Conflict(format!(
                "{target_id} is already in {kind} of user {user_id}"
            )));
        }
        self.invalidate_after_write(user_id, kind).await;
        Ok(())
    }

    /// Removes `target_id`; `Conflict` when it is not a member.
    pub async fn remove(&self, user_id: &str, target_id: &str, kind: SetKind) -> Result<()> {
        reject_marker(target_id)?;
        if !self.store.remove_member(user_id, kind, target_id).await? {
            return Err(Error::Conflict(format!(
                "{target_id} is not in {kind} of user {user_id}"
            )));
        }
        self.invalidate_after_write(user_id, kind).await;
        Ok(())
    }

    pub async fn invalidate(&self, user_id: &str, kind: SetKind) -> Result<()> {
        self.cache
            .del(&Self::cache_key(user_id, kind))
            .await
            .map_err(Error::from)
    }

    /// `Ok(None)` on a miss.
    async fn cached_membership(
        &self,
        key: &str,
        target_id: &str,
    ) -> std::result::Result<Option<bool>, crate::error::CacheError> {
        if !self.cache.exists(key).await? {
            return Ok(None);
        }
        self.cache.sismember(key, target_id).await.map(Some)
    }

    async fn load_members(&self, user_id: &str, kind: SetKind) -> Result<BTreeSet<String>> {
        let set = self.store.find_membership_set(user_id).await?;
        Ok(set
            .map(|set| set.members(kind).clone())
            .unwrap_or_default())
    }

    async fn populate(
        &self,
        key: &str,
        members: BTreeSet<String>,
    ) -> std::result::Result<(), crate::error::CacheError> {
        let mut values: Vec<String> = members.into_iter().collect();
        values.push(EMPTY_SET_MARKER.to_string());
        self.cache.sadd(key, &values).await
    }

    // A write that committed and invalidated between our load and `SADD`
    // would otherwise be masked until the user's next write.
    async fn discard_if_moved(
        &self,
        key: &str,
        user_id: &str,
        kind: SetKind,
        loaded: &BTreeSet<String>,
    ) {
        let moved = match self.load_members(user_id, kind).await {
            Ok(current) => current != *loaded,
            Err(e) => {
                tracing::warn!(%key, error = %e, "membership recheck failed");
                true
            }
        };
        if moved {
            tracing::debug!(%key, "membership set moved during load, dropping");
            if let Err(e) = self.cache.del(key).await {
                tracing::error!(%key, error = %e, "failed to drop stale membership set");
            }
        }
    }

    // The store write already committed; a failed delete leaves a stale set
    // until the key is dropped again.
    async fn invalidate_after_write(&self, user_id: &str, kind: SetKind) {
        if let Err(e) = self.invalidate(user_id, kind).await {
            tracing::error!(user_id, %kind, error = %e, "membership cache invalidation failed");
        }
    }
}

fn reject_marker(target_id: &str) -> Result<()> {
    if target_id == EMPTY_SET_MARKER {
        return Err(Error::InvalidInput(format!("{target_id} is not a valid target id")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::membership::MembershipSet;
    use crate::memory::{InMemoryCache, InMemoryStore};
    use async_trait::async_trait;
    use rstest::{fixture, rstest};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Harness {
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        tracker: MembershipTracker,
    }

    #[fixture]
    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let tracker = MembershipTracker::new(store.clone(), cache.clone());
        Harness { store, cache, tracker }
    }

    #[rstest]
    #[case(SetKind::LikedTasks)]
    #[case(SetKind::LikedComments)]
    #[case(SetKind::CollectedTasks)]
    #[tokio::test]
    async fn second_add_conflicts_and_membership_holds(harness: Harness, #[case] kind: SetKind) {
        harness.tracker.add("u1", "t1", kind).await.unwrap();
        assert!(harness.tracker.is_member("u1", "t1", kind).await.unwrap());

        let again = harness.tracker.add("u1", "t1", kind).await;
        assert!(matches!(again, Err(Error::Conflict(_))));
        assert!(harness.tracker.is_member("u1", "t1", kind).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn remove_of_non_member_conflicts(harness: Harness) {
        let result = harness.tracker.remove("u1", "t1", SetKind::LikedTasks).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        harness.tracker.add("u1", "t1", SetKind::LikedTasks).await.unwrap();
        harness.tracker.remove("u1", "t1", SetKind::LikedTasks).await.unwrap();
        assert!(!harness.tracker.is_member("u1", "t1", SetKind::LikedTasks).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn miss_loads_whole_set_and_writes_invalidate(harness: Harness) {
        harness.store.add_member("u1", SetKind::LikedTasks, "t1").await.unwrap();
        harness.store.add_member("u1", SetKind::LikedTasks, "t2").await.unwrap();

        assert!(!harness.tracker.is_member("u1", "t9", SetKind::LikedTasks).await.unwrap());
        let key = MembershipTracker::cache_key("u1", SetKind::LikedTasks);
        let cached = harness.cache.members(&key).await.expect("set populated");
        assert!(cached.contains("t1") && cached.contains("t2"));
        assert_eq!(harness.cache.ttl(&key).await, None);

        harness.tracker.add("u1", "t9", SetKind::LikedTasks).await.unwrap();
        assert_eq!(harness.cache.members(&key).await, None);
        assert!(harness.tracker.is_member("u1", "t9", SetKind::LikedTasks).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn empty_set_is_cached_as_loaded(harness: Harness) {
        assert!(!harness.tracker.is_member("u2", "t1", SetKind::CollectedTasks).await.unwrap());
        let key = MembershipTracker::cache_key("u2", SetKind::CollectedTasks);
        assert!(harness.cache.exists(&key).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn unavailable_cache_falls_back_to_store(harness: Harness) {
        harness.tracker.add("u1", "t1", SetKind::LikedTasks).await.unwrap();
        harness.cache.set_unavailable(true);

        assert!(harness.tracker.is_member("u1", "t1", SetKind::LikedTasks).await.unwrap());
        // Writes still land in the store even though the delete fails.
        harness.tracker.add("u1", "t2", SetKind::LikedTasks).await.unwrap();
        assert!(harness.tracker.is_member("u1", "t2", SetKind::LikedTasks).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn marker_id_is_never_a_member(harness: Harness) {
        assert!(matches!(
            harness.tracker.add("u1", EMPTY_SET_MARKER, SetKind::LikedTasks).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(!harness.tracker.is_member("u1", "t1", SetKind::LikedTasks).await.unwrap());
        assert!(!harness
            .tracker
            .is_member("u1", EMPTY_SET_MARKER, SetKind::LikedTasks)
            .await
            .unwrap());
    }

    /// Lets a write land right after the tracker's first load.
    struct WriteAfterFirstLoad {
        inner: Arc<InMemoryStore>,
        fired: AtomicBool,
    }

    #[async_trait]
    impl MembershipStore for WriteAfterFirstLoad {
        async fn find_membership_set(
            &self,
            user_id: &str,
        ) -> std::result::Result<Option<MembershipSet>, StoreError> {
            let loaded = self.inner.find_membership_set(user_id).await?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.inner.add_member(user_id, SetKind::LikedTasks, "t2").await?;
            }
            Ok(loaded)
        }

        async fn add_member(
            &self,
            user_id: &str,
            kind: SetKind,
            target_id: &str,
        ) -> std::result::Result<bool, StoreError> {
            self.inner.add_member(user_id, kind, target_id).await
        }

        async fn remove_member(
            &self,
            user_id: &str,
            kind: SetKind,
            target_id: &str,
        ) -> std::result::Result<bool, StoreError> {
            self.inner.remove_member(user_id, kind, target_id).await
        }
    }

    #[tokio::test]
    async fn set_loaded_across_a_write_is_not_kept() {
        let inner = Arc::new(InMemoryStore::new());
        inner.add_member("u1", SetKind::LikedTasks, "t1").await.unwrap();
        let cache = Arc::new(InMemoryCache::new());
        let store = Arc::new(WriteAfterFirstLoad {
            inner,
            fired: AtomicBool::new(false),
        });
        let tracker = MembershipTracker::new(store, cache.clone());

        assert!(!tracker.is_member("u1", "t2", SetKind::LikedTasks).await.unwrap());
        let key = MembershipTracker::cache_key("u1", SetKind::LikedTasks);
        assert_eq!(cache.members(&key).await, None);
        assert!(tracker.is_member("u1", "t2", SetKind::LikedTasks).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_adds_admit_exactly_one(harness: Harness) {
        let tracker = harness.tracker.clone();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.add("u1", "t1", SetKind::LikedTasks).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(Error::Conflict(_)) => {}
                Err(other) => panic!("unexpected {other}"),
            }
        }
        assert_eq!(succeeded, 1);
    }
}
