//! Key store for sender accounts
//!
//! Credentials are kept one file per account under
//! `<credentials_dir>/<network>/<account>.json`, in the layout the network's
//! CLI tools write.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use crate::tx_builder::{Ed25519Signer, TxSigner};
use crate::types::PublicKey;

#[derive(Deserialize)]
struct CredentialFile {
    account_id: Option<String>,
    public_key: String,
    #[serde(alias = "secret_key")]
    private_key: String,
}

/// Loads signing keys of sender accounts
#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
    network_id: String,
}

impl KeyStore {
    pub fn new(root: impl Into<PathBuf>, network_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            network_id: network_id.into(),
        }
    }

    /// Credential file of `account_id`
    pub fn path_for(&self, account_id: &str) -> PathBuf {
        self.root
            .join(&self.network_id)
            .join(format!("{}.json", account_id))
    }

    /// Load and check the key of `account_id`
    pub fn load_signer(&self, account_id: &str) -> Result<Ed25519Signer> {
        let path = self.path_for(account_id);
        let mut raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        let parsed: Result<CredentialFile, _> = serde_json::from_str(&raw);
        raw.zeroize();
        let mut file =
            parsed.with_context(|| format!("Failed to parse key file: {}", path.display()))?;

        let signer = Ed25519Signer::from_secret_str(&file.private_key);
        file.private_key.zeroize();
        let signer = signer.with_context(|| format!("Invalid secret key in {}", path.display()))?;

        check_identity(&path, account_id, &file, &signer)?;
        Ok(signer)
    }
}

fn check_identity(
    path: &Path,
    account_id: &str,
    file: &CredentialFile,
    signer: &Ed25519Signer,
) -> Result<()> {
    if let Some(stored) = &file.account_id {
        if stored != account_id {
            bail!(
                "Key file {} belongs to {}, not {}",
                path.display(),
                stored,
                account_id
            );
        }
    }

    let declared: PublicKey = file
        .public_key
        .parse()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid public key in {}", path.display()))?;
    if declared != signer.public_key() {
        bail!(
            "Key file {} declares {} but its secret key derives {}",
            path.display(),
            declared,
            signer.public_key()
        );
    }
    Ok(())
}
