//! Identity registry and the registration-root oracle.
//!
//! The registry tree accumulates identity leaves. Each insertion publishes a
//! new root into a bounded history; a superseded root stays valid for a
//! configured window so proofs generated just before an update still verify.

use crate::config::{RegistryConfig, MAX_ROOT_VALIDITY_SECS};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use zkrecover_crypto::{field_to_word, Fr, PoseidonMerkleTree};
use zkrecover_types::{RecoveryError, RecoveryResult, RegistrationRoot, Word};

/// Answers "is this registration root currently valid?".
pub trait RegistrationRootOracle: Send + Sync {
    fn is_root_valid(&self, root: &RegistrationRoot) -> bool;
}

struct RootHistoryInner {
    current: Option<RegistrationRoot>,
    /// Superseded roots with the time they were replaced, oldest first.
    superseded: VecDeque<(RegistrationRoot, DateTime<Utc>)>,
}

pub struct RootHistory {
    inner: RwLock<RootHistoryInner>,
    validity: Duration,
    max_roots: usize,
}

impl RootHistory {
    pub fn new(validity: Duration, max_roots: usize) -> Self {
        Self {
            inner: RwLock::new(RootHistoryInner {
                current: None,
                superseded: VecDeque::new(),
            }),
            validity,
            max_roots,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            Duration::seconds(config.root_validity_secs.min(MAX_ROOT_VALIDITY_SECS) as i64),
            config.max_roots,
        )
    }

    pub fn publish_root(&self, root: RegistrationRoot) {
        self.publish_root_at(root, Utc::now());
    }

    pub fn publish_root_at(&self, root: RegistrationRoot, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        if inner.current == Some(root) {
            return;
        }
        if let Some(previous) = inner.current.replace(root) {
            inner.superseded.push_back((previous, now));
            while inner.superseded.len() > self.max_roots {
                inner.superseded.pop_front();
            }
        }
        info!(root = %root, "registration root published");
    }

    pub fn current_root(&self) -> Option<RegistrationRoot> {
        self.inner.read().current
    }

    pub fn is_root_valid_at(&self, root: &RegistrationRoot, now: DateTime<Utc>) -> bool {
        let inner = self.inner.read();
        if inner.current.as_ref() == Some(root) {
            return true;
        }
        inner
            .superseded
            .iter()
            .rev()
            .find(|(r, _)| r == root)
            .map(|(_, replaced_at)| now - *replaced_at <= self.validity)
            .unwrap_or(false)
    }
}

impl RegistrationRootOracle for RootHistory {
    fn is_root_valid(&self, root: &RegistrationRoot) -> bool {
        self.is_root_valid_at(root, Utc::now())
    }
}

/// Poseidon tree of identity leaves feeding a [`RootHistory`].
pub struct IdentityRegistry {
    tree: RwLock<PoseidonMerkleTree>,
    indices: RwLock<HashMap<Word, usize>>,
    roots: Arc<RootHistory>,
}

impl IdentityRegistry {
    pub fn new(depth: usize, roots: Arc<RootHistory>) -> Self {
        let tree = PoseidonMerkleTree::new(depth);
        roots.publish_root(RegistrationRoot::from_bytes(tree.root()));
        Self {
            tree: RwLock::new(tree),
            indices: RwLock::new(HashMap::new()),
            roots,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.tree_depth, Arc::new(RootHistory::from_config(config)))
    }

    pub fn depth(&self) -> usize {
        self.tree.read().depth()
    }

    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    pub fn roots(&self) -> Arc<RootHistory> {
        self.roots.clone()
    }

    /// Inserts an identity leaf and publishes the resulting root.
    pub fn register(&self, leaf: Fr) -> RecoveryResult<usize> {
        let key = field_to_word(&leaf);
        let mut indices = self.indices.write();
        if indices.contains_key(&key) {
            return Err(RecoveryError::Crypto("Identity already registered".into()));
        }

        let (index, root) = {
            let mut tree = self.tree.write();
            let index = tree.insert_field(leaf)?;
            (index, tree.root())
        };
        indices.insert(key, index);
        drop(indices);

        debug!(index, "identity registered");
        self.roots.publish_root(RegistrationRoot::from_bytes(root));
        Ok(index)
    }

    pub fn index_of(&self, leaf: Fr) -> Option<usize> {
        self.indices.read().get(&field_to_word(&leaf)).copied()
    }

    pub fn proof(&self, index: usize) -> Option<Vec<(Fr, bool)>> {
        self.tree.read().proof_field(index)
    }

    pub fn root(&self) -> RegistrationRoot {
        RegistrationRoot::from_bytes(self.tree.read().root())
    }
}

impl RegistrationRootOracle for IdentityRegistry {
    fn is_root_valid(&self, root: &RegistrationRoot) -> bool {
        self.roots.is_root_valid(root)
    }
}
