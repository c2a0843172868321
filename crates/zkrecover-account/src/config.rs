use crate::storage::{AccountStore, MemoryAccountStore, SledAccountStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zkrecover_crypto::{CircuitKind, Groth16Verifier};
use zkrecover_types::{RecoveryError, RecoveryResult};

pub const DEFAULT_ROOT_VALIDITY_SECS: u64 = 3600;
pub const DEFAULT_MAX_ROOTS: usize = 256;
pub const DEFAULT_TREE_DEPTH: usize = 20;
/// Deeper trees make the identity circuit impractically large.
pub const MAX_TREE_DEPTH: usize = 32;
pub const MAX_ROOT_VALIDITY_SECS: u64 = 365 * 24 * 3600;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub registry: RegistryConfig,
    pub keys: KeysConfig,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long a superseded registration root keeps verifying.
    pub root_validity_secs: u64,
    pub max_roots: usize,
    pub tree_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_validity_secs: DEFAULT_ROOT_VALIDITY_SECS,
            max_roots: DEFAULT_MAX_ROOTS,
            tree_depth: DEFAULT_TREE_DEPTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub dir: PathBuf,
    pub identity_query_vk: String,
    pub commitment_knowledge_vk: String,
    pub commitment_recovery_vk: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./zk-keys"),
            identity_query_vk: vk_file_name(CircuitKind::IdentityQuery),
            commitment_knowledge_vk: vk_file_name(CircuitKind::CommitmentKnowledge),
            commitment_recovery_vk: vk_file_name(CircuitKind::CommitmentRecovery),
        }
    }
}

/// Matches the layout `zk-keygen generate` writes.
fn vk_file_name(circuit: CircuitKind) -> String {
    format!("{}.vk.bin", circuit.file_stem())
}

impl KeysConfig {
    pub fn vk_path(&self, circuit: CircuitKind) -> PathBuf {
        let file = match circuit {
            CircuitKind::IdentityQuery => &self.identity_query_vk,
            CircuitKind::CommitmentKnowledge => &self.commitment_knowledge_vk,
            CircuitKind::CommitmentRecovery => &self.commitment_recovery_vk,
        };
        self.dir.join(file)
    }

    pub fn load_verifier(&self, circuit: CircuitKind) -> RecoveryResult<Groth16Verifier> {
        let path = self.vk_path(circuit);
        let bytes = std::fs::read(&path).map_err(|e| {
            RecoveryError::Config(format!("Failed to read verifying key {:?}: {}", path, e))
        })?;
        let verifier = Groth16Verifier::from_vk_bytes(&bytes)?;

        if verifier.num_public_inputs() != circuit.num_public_inputs() {
            return Err(RecoveryError::Config(format!(
                "Verifying key {:?} expects {} public inputs, {} circuit has {}",
                path,
                verifier.num_public_inputs(),
                circuit,
                circuit.num_public_inputs()
            )));
        }

        info!(circuit = %circuit, "verifying key loaded from {:?}", path);
        Ok(verifier)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Keep account state in memory only.
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./zkrecover-data/accounts"),
            temporary: false,
        }
    }
}

impl StorageConfig {
    pub fn open(&self) -> RecoveryResult<Box<dyn AccountStore>> {
        if self.temporary {
            return Ok(Box::new(MemoryAccountStore::new()));
        }
        Ok(Box::new(SledAccountStore::open(&self.path)?))
    }
}

impl RecoveryConfig {
    pub fn load(path: impl AsRef<Path>) -> RecoveryResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| RecoveryError::Config(format!("Failed to read config: {}", e)))?;

            Self::from_toml(&contents)?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> RecoveryResult<Self> {
        toml::from_str(contents)
            .map_err(|e| RecoveryError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RecoveryResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RecoveryError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecoveryError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| RecoveryError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("ZKRECOVER_ROOT_VALIDITY_SECS") {
            if let Ok(s) = secs.parse() {
                self.registry.root_validity_secs = s;
            }
        }

        if let Ok(depth) = std::env::var("ZKRECOVER_TREE_DEPTH") {
            if let Ok(d) = depth.parse() {
                self.registry.tree_depth = d;
            }
        }

        if let Ok(dir) = std::env::var("ZKRECOVER_KEYS_DIR") {
            self.keys.dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("ZKRECOVER_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if std::env::var("ZKRECOVER_STORAGE_TEMPORARY").is_ok() {
            self.storage.temporary = true;
        }
    }

    pub fn validate(&self) -> RecoveryResult<()> {
        if self.registry.tree_depth == 0 || self.registry.tree_depth > MAX_TREE_DEPTH {
            return Err(RecoveryError::Config(format!(
                "Tree depth must be between 1 and {}",
                MAX_TREE_DEPTH
            )));
        }

        if self.registry.max_roots == 0 {
            return Err(RecoveryError::Config(
                "Root history must keep at least one root".into(),
            ));
        }

        if self.registry.root_validity_secs > MAX_ROOT_VALIDITY_SECS {
            return Err(RecoveryError::Config(
                "Root validity window cannot exceed one year".into(),
            ));
        }

        if self.registry.root_validity_secs == 0 {
            warn!("Root validity window is 0 - only the current registration root will verify");
        }

        for (circuit, file) in [
            (CircuitKind::IdentityQuery, &self.keys.identity_query_vk),
            (CircuitKind::CommitmentKnowledge, &self.keys.commitment_knowledge_vk),
            (CircuitKind::CommitmentRecovery, &self.keys.commitment_recovery_vk),
        ] {
            if file.trim().is_empty() {
                return Err(RecoveryError::Config(format!(
                    "Missing verifying key file name for {}",
                    circuit
                )));
            }
        }

        if !self.storage.temporary && self.storage.path.as_os_str().is_empty() {
            return Err(RecoveryError::Config("Storage path cannot be empty".into()));
        }

        Ok(())
    }
}
