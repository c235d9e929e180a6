//! Commission calculation
//!
//! Turns a sale amount and a commission structure into per-recipient credits
//! plus the pool shares. Pure: nothing here touches the ledger.

use serde::{Deserialize, Serialize};
use upline_core::{
    AdminRateTable, Amount, Category, CommissionStructure, MemberDirectory, MemberId, Membership,
    Result,
};

use crate::chain::resolve_upline;

/// A single credit owed to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionCredit {
    pub recipient: MemberId,
    pub amount: Amount,
    pub level: u8,
    pub category: Category,
}

impl CommissionCredit {
    pub fn describe(&self, source: &MemberId) -> String {
        match self.category {
            Category::Sponsor => format!("Direct sponsor bonus from {}", source),
            Category::Depth(level) => format!("Level {} commission from {}", level, source),
            Category::Admin(level) => format!("Level {} package commission from {}", level, source),
            Category::Passive => "Passive pool share".to_string(),
            Category::Company => "Company fund settlement".to_string(),
        }
    }
}

/// Everything one sale produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub entries: Vec<CommissionCredit>,
    pub total_distributed: Amount,
    pub passive_pool_amount: Amount,
    pub company_fund_amount: Amount,
    /// Unallocated remainder: skipped levels and rounding leftovers
    pub residual: Amount,
}

impl CommissionBreakdown {
    /// What the company fund receives: its own share plus the residual
    pub fn company_fund_delta(&self) -> Amount {
        self.company_fund_amount + self.residual
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.passive_pool_amount.is_zero()
            && self.company_fund_amount.is_zero()
    }
}

pub struct CommissionCalculator;

impl CommissionCalculator {
    /// Compute the distribution for one sale.
    ///
    /// A missing buyer, a free buyer, or a non-positive amount yields an empty
    /// breakdown; callers decide whether that is fatal. An ineligible member
    /// at some level simply forfeits that level; the share is not passed up
    /// and ends in the residual.
    pub fn calculate<D: MemberDirectory + ?Sized>(
        buyer_id: &MemberId,
        sale_amount: Amount,
        directory: &D,
        structure: &CommissionStructure,
    ) -> Result<CommissionBreakdown> {
        Self::calculate_with_depth(buyer_id, sale_amount, directory, structure, structure.depth())
    }

    /// Same as [`Self::calculate`] with the upline walk capped at `max_depth`
    pub fn calculate_with_depth<D: MemberDirectory + ?Sized>(
        buyer_id: &MemberId,
        sale_amount: Amount,
        directory: &D,
        structure: &CommissionStructure,
        max_depth: u8,
    ) -> Result<CommissionBreakdown> {
        let buyer = match directory.member(buyer_id)? {
            Some(b) => b,
            None => return Ok(CommissionBreakdown::default()),
        };
        if buyer.membership == Membership::Free || !sale_amount.is_positive() {
            return Ok(CommissionBreakdown::default());
        }

        let mut entries = Vec::new();

        if let Some(sponsor_id) = &buyer.sponsor_id {
            if let Some(sponsor) = directory.member(sponsor_id)? {
                let amount = sale_amount.percent(structure.direct_sponsor);
                if sponsor.is_eligible() && amount.is_positive() {
                    entries.push(CommissionCredit {
                        recipient: sponsor.id,
                        amount,
                        level: 1,
                        category: Category::Sponsor,
                    });
                }
            }
        }

        for link in resolve_upline(directory, buyer_id, max_depth.min(structure.depth()))? {
            let pct = match structure.level(link.level) {
                Some(p) => p,
                None => continue,
            };
            let amount = sale_amount.percent(pct);
            if !link.member.is_eligible() || !amount.is_positive() {
                continue;
            }
            entries.push(CommissionCredit {
                recipient: link.member.id,
                amount,
                level: link.level,
                category: Category::Depth(link.level),
            });
        }

        let total_distributed: Amount = entries.iter().map(|e| e.amount).sum();
        let mut passive_pool_amount = sale_amount.percent(structure.passive_pool);
        let mut company_fund_amount = sale_amount.percent(structure.company_fund);

        let mut residual = sale_amount - total_distributed - passive_pool_amount - company_fund_amount;
        if residual.cents() < 0 {
            // Rounding overshoot: the company share absorbs it first
            let mut deficit = -residual;
            let from_company = deficit.min(company_fund_amount);
            company_fund_amount -= from_company;
            deficit -= from_company;
            let from_passive = deficit.min(passive_pool_amount);
            passive_pool_amount -= from_passive;
            residual = Amount::ZERO;
        }

        Ok(CommissionBreakdown {
            entries,
            total_distributed,
            passive_pool_amount,
            company_fund_amount,
            residual,
        })
    }

    /// Operator-triggered package commission: level rates from `table`,
    /// level 1 being the source member's sponsor. No pool shares.
    pub fn calculate_admin<D: MemberDirectory + ?Sized>(
        source_id: &MemberId,
        amount: Amount,
        directory: &D,
        table: &AdminRateTable,
    ) -> Result<Vec<CommissionCredit>> {
        if !amount.is_positive() {
            return Ok(Vec::new());
        }

        let depth = table.levels.len() as u8;
        let mut credits = Vec::new();
        for link in resolve_upline(directory, source_id, depth)? {
            let pct = match table.levels.get(link.level as usize - 1) {
                Some(p) => *p,
                None => continue,
            };
            let share = amount.percent(pct);
            if !link.member.is_eligible() || !share.is_positive() {
                continue;
            }
            credits.push(CommissionCredit {
                recipient: link.member.id,
                amount: share,
                level: link.level,
                category: Category::Admin(link.level),
            });
        }
        Ok(credits)
    }
}
