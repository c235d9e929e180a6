//! Commission structures and earning caps

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Percent};
use crate::error::{CommissionError, Result};
use crate::member::PackageTier;

/// Upper bound on configured depth levels
pub const MAX_LEVELS: usize = 12;

/// Percentages applied to a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionStructure {
    /// Direct sponsor bonus
    pub direct_sponsor: Percent,
    /// Depth commission per upline level; index 0 is level 1 (direct sponsor)
    pub levels: Vec<Percent>,
    pub passive_pool: Percent,
    pub company_fund: Percent,
}

impl CommissionStructure {
    pub fn total_basis_points(&self) -> u32 {
        self.direct_sponsor.basis_points()
            + self.levels.iter().map(|p| p.basis_points()).sum::<u32>()
            + self.passive_pool.basis_points()
            + self.company_fund.basis_points()
    }

    /// Percentage for a 1-based depth level, if configured
    pub fn level(&self, level: u8) -> Option<Percent> {
        if level == 0 {
            return None;
        }
        self.levels.get(level as usize - 1).copied()
    }

    pub fn depth(&self) -> u8 {
        self.levels.len() as u8
    }

    pub fn validate(&self) -> Result<()> {
        if self.levels.len() > MAX_LEVELS {
            return Err(CommissionError::InvalidConfig(format!(
                "at most {} depth levels are supported, got {}",
                MAX_LEVELS,
                self.levels.len()
            )));
        }
        if self.total_basis_points() > 10_000 {
            return Err(CommissionError::InvalidConfig(format!(
                "commission percentages sum to {}%, more than 100%",
                self.total_basis_points() as f64 / 100.0
            )));
        }
        Ok(())
    }
}

impl Default for CommissionStructure {
    fn default() -> Self {
        Self {
            direct_sponsor: Percent::from_basis_points(1_000),
            levels: [500, 300, 200, 100, 100, 50, 50]
                .into_iter()
                .map(Percent::from_basis_points)
                .collect(),
            passive_pool: Percent::from_basis_points(500),
            company_fund: Percent::from_basis_points(1_000),
        }
    }
}

/// Level rates for operator-triggered package commissions.
/// Level 1 is the source member's sponsor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminRateTable {
    pub levels: Vec<Percent>,
}

impl AdminRateTable {
    pub fn validate(&self) -> Result<()> {
        if self.levels.len() > MAX_LEVELS {
            return Err(CommissionError::InvalidConfig(format!(
                "at most {} admin levels are supported",
                MAX_LEVELS
            )));
        }
        let total: u32 = self.levels.iter().map(|p| p.basis_points()).sum();
        if total > 10_000 {
            return Err(CommissionError::InvalidConfig(
                "admin level rates sum to more than 100%".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AdminRateTable {
    fn default() -> Self {
        Self {
            levels: [1_000, 500, 300, 200, 100]
                .into_iter()
                .map(Percent::from_basis_points)
                .collect(),
        }
    }
}

/// Daily and monthly PAID caps for one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCaps {
    #[serde(with = "crate::amount::as_units")]
    pub daily: Amount,
    #[serde(with = "crate::amount::as_units")]
    pub monthly: Amount,
}

impl TierCaps {
    pub const fn new(daily: Amount, monthly: Amount) -> Self {
        Self { daily, monthly }
    }
}

/// Earning caps for every paid tier. NONE is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningCaps {
    pub basic: TierCaps,
    pub pro: TierCaps,
    pub elite: TierCaps,
}

impl EarningCaps {
    pub fn for_tier(&self, tier: PackageTier) -> TierCaps {
        match tier {
            PackageTier::None => TierCaps::new(Amount::ZERO, Amount::ZERO),
            PackageTier::Basic => self.basic,
            PackageTier::Pro => self.pro,
            PackageTier::Elite => self.elite,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, caps) in [("basic", self.basic), ("pro", self.pro), ("elite", self.elite)] {
            if caps.daily.cents() < 0 || caps.monthly.cents() < 0 {
                return Err(CommissionError::InvalidConfig(format!(
                    "{} caps must not be negative",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for EarningCaps {
    fn default() -> Self {
        Self {
            basic: TierCaps::new(Amount::from_units(200), Amount::from_units(3_000)),
            pro: TierCaps::new(Amount::from_units(1_000), Amount::from_units(20_000)),
            elite: TierCaps::new(Amount::from_units(10_000), Amount::from_units(200_000)),
        }
    }
}
