use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use errand_atoms::cache::{FastCache, RedisCache};
use errand_atoms::dynamo::DynamoStore;
use errand_atoms::error::CacheError;
use errand_atoms::files::{DynamoFileStore, FileStore};
use errand_atoms::membership::MembershipStore;
use errand_atoms::messages::NotificationSink;
use errand_atoms::participation::ParticipationStore;
use errand_atoms::tasks::TaskStore;
use errand_atoms::users::{ProfileService, UserProfiles};
use marketplace_block::{Dependencies, ParticipationManager, TaskManager};

use crate::config::AppConfig;

/// Everything a request handler needs, built once per process.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub tasks: TaskManager,
    pub participations: ParticipationManager,
    pub profiles: ProfileService,
}

impl AppState {
    /// DynamoDB for documents and messages, S3 for file blobs, Redis for
    /// the Fast Cache.
    pub async fn load(config: AppConfig) -> Result<Self, CacheError> {
        let sdk_config = aws_config::load_from_env().await;
        let dynamo = DynamoClient::new(&sdk_config);
        let s3 = S3Client::new(&sdk_config);

        let store = Arc::new(DynamoStore::new(
            dynamo,
            config.table_name.clone(),
            config.index_name.clone(),
            config.store_timeout,
        ));
        let files = Arc::new(DynamoFileStore::new(
            store.as_ref().clone(),
            s3,
            config.file_bucket.clone(),
        ));
        let cache = Arc::new(RedisCache::from_url(&config.redis_url, config.cache_timeout)?);

        tracing::info!(
            table = %config.table_name,
            bucket = %config.file_bucket,
            "application state ready"
        );
        Ok(Self::from_parts(config, store.clone(), cache, files, store))
    }

    /// Wires the managers from one Durable Store handle and the given
    /// collaborators.
    pub fn from_parts<S>(
        config: AppConfig,
        store: Arc<S>,
        cache: Arc<dyn FastCache>,
        files: Arc<dyn FileStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self
    where
        S: TaskStore + ParticipationStore + MembershipStore + UserProfiles + 'static,
    {
        let profiles: Arc<dyn UserProfiles> = store.clone();
        let deps = Dependencies::new(
            store,
            cache,
            profiles.clone(),
            files,
            notifications,
            config.user_brief_ttl,
        );

        Self {
            profiles: ProfileService::new(profiles, deps.briefs.clone()),
            tasks: TaskManager::new(deps.clone()),
            participations: ParticipationManager::new(deps),
            config,
        }
    }
}
