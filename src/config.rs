//! Configuration module for the load generator
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::{DispatchConfig, ResolverConfig, Workload};
use crate::types::Action;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network the accounts live on (`testnet`, `mainnet`, ...)
    #[serde(default = "default_network_id")]
    pub network_id: String,

    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Sending accounts
    pub senders: SendersConfig,

    /// Volume and pacing
    #[serde(default)]
    pub load: LoadConfig,

    /// Status polling of broadcast transactions
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// What every transaction does
    #[serde(default)]
    pub action: ActionConfig,

    /// Where the signing keys are stored
    #[serde(default)]
    pub keys: KeysConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint; derived from the network id when absent
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendersConfig {
    /// Parent account of all senders
    pub factory_account: String,

    /// Number of sender accounts
    #[serde(default = "default_sender_count")]
    pub count: usize,

    /// Sender `i` is `<prefix><i>.<factory_account>`
    #[serde(default = "default_sender_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Transactions across all senders
    #[serde(default = "default_total_tx")]
    pub total_tx: u64,

    /// Pause before every submission; scales with the sender count when absent
    pub tx_sleep_ms: Option<u64>,

    /// Concurrent confirmations per sender; shared out between senders when absent
    pub queue_size: Option<usize>,

    /// Wait between broadcast and the first status query
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Poll interval while a confirmation queue is saturated
    #[serde(default = "default_backpressure_poll_ms")]
    pub backpressure_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_max_trials")]
    pub max_trials: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_min_trials_before_supersede")]
    pub min_trials_before_supersede: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Contract called by every transaction; `counter.<factory_account>` when absent
    pub receiver_id: Option<String>,

    #[serde(default = "default_method_name")]
    pub method_name: String,

    /// JSON arguments of the call
    #[serde(default = "default_args")]
    pub args: serde_json::Value,

    /// Gas attached to the call
    #[serde(default = "default_gas")]
    pub gas: u64,

    /// Deposit attached to the call, in yocto units. Kept as a string since
    /// amounts overflow the integer range of TOML.
    #[serde(default = "default_deposit")]
    pub deposit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Root of the `<network>/<account>.json` credential files
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Explorer base URL used for links in the logs
    pub explorer_url: Option<String>,
}

// Default value functions
fn default_network_id() -> String { "testnet".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_sender_count() -> usize { 1 }
fn default_sender_prefix() -> String { "u".to_string() }
fn default_total_tx() -> u64 { 100 }
fn default_settle_delay_ms() -> u64 { 400 }
fn default_backpressure_poll_ms() -> u64 { 100 }
fn default_max_trials() -> u32 { 10 }
fn default_retry_delay_ms() -> u64 { 400 }
fn default_min_trials_before_supersede() -> u32 { 6 }
fn default_method_name() -> String { "increment".to_string() }
fn default_args() -> serde_json::Value { serde_json::json!({}) }
fn default_gas() -> u64 { 50_000_000_000_000 }
fn default_deposit() -> String { "0".to_string() }
fn default_credentials_dir() -> String { "~/.near-credentials".to_string() }
fn default_metrics_port() -> u16 { 9090 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            total_tx: default_total_tx(),
            tx_sleep_ms: None,
            queue_size: None,
            settle_delay_ms: default_settle_delay_ms(),
            backpressure_poll_ms: default_backpressure_poll_ms(),
        }
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            receiver_id: None,
            method_name: default_method_name(),
            args: default_args(),
            gas: default_gas(),
            deposit: default_deposit(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            retry_delay_ms: default_retry_delay_ms(),
            min_trials_before_supersede: default_min_trials_before_supersede(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            credentials_dir: default_credentials_dir(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            explorer_url: None,
        }
    }
}

/// One derived sender account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderAccount {
    pub account_id: String,
    pub nickname: String,
}

impl Config {
    /// Minimal configuration for `factory_account`, everything else defaulted
    pub fn for_factory(factory_account: impl Into<String>) -> Self {
        Self {
            network_id: default_network_id(),
            rpc: RpcConfig::default(),
            senders: SendersConfig {
                factory_account: factory_account.into(),
                count: default_sender_count(),
                prefix: default_sender_prefix(),
            },
            load: LoadConfig::default(),
            confirmation: ConfirmationConfig::default(),
            action: ActionConfig::default(),
            keys: KeysConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and `LOADGEN_*` overrides, then validate
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LOADGEN_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("LOADGEN_NETWORK_ID") {
            self.network_id = network;
        }
        if let Some(url) = lookup("LOADGEN_RPC_URL") {
            self.rpc.url = Some(url);
        }
        if let Some(factory) = lookup("LOADGEN_FACTORY_ACCOUNT") {
            self.senders.factory_account = factory;
        }
        if let Some(count) = lookup("LOADGEN_SENDER_COUNT") {
            self.senders.count = count
                .parse()
                .with_context(|| format!("LOADGEN_SENDER_COUNT is not a number: {}", count))?;
        }
        if let Some(total) = lookup("LOADGEN_TOTAL_TX") {
            self.load.total_tx = total
                .parse()
                .with_context(|| format!("LOADGEN_TOTAL_TX is not a number: {}", total))?;
        }
        if let Some(dir) = lookup("LOADGEN_CREDENTIALS_DIR") {
            self.keys.credentials_dir = dir;
        }
        if let Some(port) = lookup("LOADGEN_METRICS_PORT") {
            self.monitoring.metrics_port = port
                .parse()
                .with_context(|| format!("LOADGEN_METRICS_PORT is not a port: {}", port))?;
        }
        Ok(())
    }

    /// Reject configurations the dispatch engine cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.senders.factory_account.trim().is_empty() {
            bail!("senders.factory_account must be set");
        }
        if self.senders.count == 0 {
            bail!("senders.count must be at least 1");
        }
        if self.load.total_tx < self.senders.count as u64 {
            bail!(
                "load.total_tx ({}) must be at least senders.count ({})",
                self.load.total_tx,
                self.senders.count
            );
        }
        if self.load.queue_size == Some(0) {
            bail!("load.queue_size must be at least 1");
        }
        if self.confirmation.max_trials == 0 {
            bail!("confirmation.max_trials must be at least 1");
        }
        // Budget exhaustion may conclude supersession, which must respect the threshold
        if self.confirmation.min_trials_before_supersede >= self.confirmation.max_trials {
            bail!(
                "confirmation.min_trials_before_supersede ({}) must be below max_trials ({})",
                self.confirmation.min_trials_before_supersede,
                self.confirmation.max_trials
            );
        }
        let url = self.rpc_url();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("rpc.url must be an http(s) URL: {}", url);
        }
        if self.action.method_name.is_empty() {
            bail!("action.method_name must not be empty");
        }
        self.deposit()?;
        Ok(())
    }

    pub fn rpc_url(&self) -> String {
        self.rpc
            .url
            .clone()
            .unwrap_or_else(|| format!("https://rpc.{}.near.org", self.network_id))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    /// Sender accounts in run order
    pub fn sender_accounts(&self) -> Vec<SenderAccount> {
        (0..self.senders.count)
            .map(|i| {
                let nickname = format!("{}{}", self.senders.prefix, i);
                SenderAccount {
                    account_id: format!("{}.{}", nickname, self.senders.factory_account),
                    nickname,
                }
            })
            .collect()
    }

    pub fn tx_per_sender(&self) -> u64 {
        self.load.total_tx / self.senders.count.max(1) as u64
    }

    /// Pause before each submission. More senders means each one goes slower,
    /// keeping the aggregate rate near 30 tx/s.
    pub fn tx_sleep(&self) -> Duration {
        let ms = self
            .load
            .tx_sleep_ms
            .unwrap_or(800 * self.senders.count as u64 / 30);
        Duration::from_millis(ms)
    }

    /// Confirmation concurrency per sender
    pub fn queue_size(&self) -> usize {
        self.load
            .queue_size
            .unwrap_or(90 / self.senders.count.max(1))
            .max(1)
    }

    pub fn receiver_id(&self) -> String {
        self.action
            .receiver_id
            .clone()
            .unwrap_or_else(|| format!("counter.{}", self.senders.factory_account))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_trials: self.confirmation.max_trials,
            retry_delay: Duration::from_millis(self.confirmation.retry_delay_ms),
            min_trials_before_supersede: self.confirmation.min_trials_before_supersede,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            tx_count: self.tx_per_sender(),
            pace_delay: self.tx_sleep(),
            concurrency_limit: self.queue_size(),
            settle_delay: Duration::from_millis(self.load.settle_delay_ms),
            backpressure_poll: Duration::from_millis(self.load.backpressure_poll_ms),
        }
    }

    /// Attached deposit in yocto units
    pub fn deposit(&self) -> anyhow::Result<u128> {
        self.action
            .deposit
            .trim()
            .parse()
            .with_context(|| format!("action.deposit is not an integer: {}", self.action.deposit))
    }

    pub fn workload(&self) -> anyhow::Result<Workload> {
        Ok(Workload {
            receiver_id: self.receiver_id(),
            actions: vec![Action::FunctionCall {
                method_name: self.action.method_name.clone(),
                args: self.action.args.to_string().into_bytes(),
                gas: self.action.gas,
                deposit: self.deposit()?,
            }],
        })
    }

    /// Credentials directory with a leading `~` expanded from `HOME`
    pub fn credentials_dir(&self) -> PathBuf {
        let dir = &self.keys.credentials_dir;
        match dir.strip_prefix("~/") {
            Some(rest) => match std::env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(rest),
                None => PathBuf::from(dir),
            },
            None => PathBuf::from(dir),
        }
    }
}
