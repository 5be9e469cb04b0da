use std::sync::{Arc, OnceLock};

use crate::bridge::{MatrixToMmBridge, MmToMatrixBridge};
use crate::config::BridgeConfig;
use crate::matrix::MatrixClient;
use crate::mattermost::{MmApi, RestMmApi};
use crate::store::MappingStore;
use crate::trackers::{PendingFileTracker, RecentPostTracker};
use crate::webhook::TransactionDedup;
use crate::AppResult;

/// Everything the handlers share: the two pipelines plus their backing
/// clients, store, and trackers.
pub struct BridgeState {
    pub config: Arc<BridgeConfig>,
    pub matrix: Arc<MatrixClient>,
    pub mm: Arc<dyn MmApi>,
    pub store: Arc<dyn MappingStore>,
    pub recent_posts: Arc<RecentPostTracker>,
    pub pending_files: Arc<PendingFileTracker>,
    pub mm_to_mx: MmToMatrixBridge,
    pub mx_to_mm: MatrixToMmBridge,
    pub transactions: TransactionDedup,
}

impl BridgeState {
    pub fn new(config: Arc<BridgeConfig>, store: Arc<dyn MappingStore>) -> AppResult<Arc<Self>> {
        let matrix = Arc::new(MatrixClient::new(config.clone())?);
        let mm: Arc<dyn MmApi> = Arc::new(RestMmApi::new(
            config.mattermost.base_url.clone(),
            config.mattermost.access_token.clone(),
        )?);
        let recent_posts = Arc::new(RecentPostTracker::new(config.post_tracker_max_entries));
        let pending_files = Arc::new(PendingFileTracker::new());

        let mm_to_mx = MmToMatrixBridge::new(
            matrix.clone(),
            mm.clone(),
            store.clone(),
            recent_posts.clone(),
            pending_files.clone(),
            config.clone(),
        );
        let mx_to_mm =
            MatrixToMmBridge::new(matrix.clone(), mm.clone(), store.clone(), config.clone());

        Ok(Arc::new(Self {
            config,
            matrix,
            mm,
            store,
            recent_posts,
            pending_files,
            mm_to_mx,
            mx_to_mm,
            transactions: TransactionDedup::new(),
        }))
    }
}

pub static BRIDGE: OnceLock<Arc<BridgeState>> = OnceLock::new();

pub fn init(state: Arc<BridgeState>) {
    if BRIDGE.set(state).is_err() {
        panic!("bridge state should be set once");
    }
}

pub fn get() -> &'static Arc<BridgeState> {
    BRIDGE.get().expect("bridge state should be set")
}
