//! Engine configuration file (TOML)
//!
//! Example:
//!
//! ```toml
//! company_account = "company"
//!
//! [storage]
//! path = "data/upline.db"
//!
//! [commission]
//! direct_sponsor = 10.0
//! levels = [5.0, 3.0, 2.0, 1.0, 1.0, 0.5, 0.5]
//! passive_pool = 5.0
//! company_fund = 10.0
//!
//! [limits.basic]
//! daily = 200
//! monthly = 3000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CommissionError, Result};
use crate::member::MemberId;
use crate::structure::{AdminRateTable, CommissionStructure, EarningCaps};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/upline.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub daily_reset: bool,
    pub monthly_reset: bool,
    /// Hours between passive pool distributions; 0 disables the job
    pub passive_distribution_hours: u64,
    /// Seconds between config file modification checks
    pub config_poll_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_reset: true,
            monthly_reset: true,
            passive_distribution_hours: 24 * 7,
            config_poll_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub commission: CommissionStructure,
    pub admin_commission: AdminRateTable,
    pub limits: EarningCaps,
    pub scheduler: SchedulerConfig,
    /// Upline walk bound; 0 means "as deep as the longest level table"
    pub max_chain_depth: u8,
    /// Member credited when the company fund is settled
    pub company_account: Option<MemberId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            commission: CommissionStructure::default(),
            admin_commission: AdminRateTable::default(),
            limits: EarningCaps::default(),
            scheduler: SchedulerConfig::default(),
            max_chain_depth: 0,
            company_account: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            CommissionError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(content)
            .map_err(|e| CommissionError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.commission.validate()?;
        self.admin_commission.validate()?;
        self.limits.validate()?;
        if let Some(account) = &self.company_account {
            if account.as_str().trim().is_empty() {
                return Err(CommissionError::InvalidConfig(
                    "company_account must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Effective upline walk depth
    pub fn chain_depth(&self) -> u8 {
        if self.max_chain_depth > 0 {
            return self.max_chain_depth;
        }
        self.commission
            .depth()
            .max(self.admin_commission.levels.len() as u8)
    }
}
