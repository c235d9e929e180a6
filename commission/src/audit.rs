//! Ledger replay audit

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use upline_core::{Amount, LedgerEntry, Member, MemberId};

/// A member whose wallet total disagrees with the sum of their PAID entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMismatch {
    pub member: MemberId,
    pub wallet_total: Amount,
    pub ledger_total: Amount,
}

impl AuditMismatch {
    pub fn difference(&self) -> Amount {
        self.wallet_total - self.ledger_total
    }
}

/// Replay the ledger and compare against each wallet's total earnings.
/// PAID entries addressed to unknown members are reported with a zero
/// wallet total.
pub fn audit(members: &[Member], entries: &[LedgerEntry]) -> Vec<AuditMismatch> {
    let mut paid: HashMap<&MemberId, Amount> = HashMap::new();
    for entry in entries.iter().filter(|e| e.is_paid()) {
        *paid.entry(&entry.recipient).or_default() += entry.amount;
    }

    let mut mismatches = Vec::new();
    for member in members {
        let ledger_total = paid.remove(&member.id).unwrap_or_default();
        if ledger_total != member.wallet.total_earnings {
            mismatches.push(AuditMismatch {
                member: member.id.clone(),
                wallet_total: member.wallet.total_earnings,
                ledger_total,
            });
        }
    }
    for (orphan, ledger_total) in paid {
        mismatches.push(AuditMismatch {
            member: orphan.clone(),
            wallet_total: Amount::ZERO,
            ledger_total,
        });
    }
    mismatches.sort_by(|a, b| a.member.cmp(&b.member));

    for m in &mismatches {
        warn!(
            "[AUDIT] {} wallet total {} != ledger total {}",
            m.member, m.wallet_total, m.ledger_total
        );
    }
    if mismatches.is_empty() {
        info!("[AUDIT] {} wallets match the ledger", members.len());
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use upline_core::{Category, EntryStatus, PackageTier};

    fn entry(recipient: &str, units: i64, status: EntryStatus) -> LedgerEntry {
        LedgerEntry::new(
            recipient.into(),
            Amount::from_units(units),
            Category::Sponsor,
            status,
            "sale:1",
            Utc::now(),
        )
    }

    #[test]
    fn test_audit_detects_drift() {
        let mut a = Member::new("a", None, PackageTier::Pro);
        a.wallet.credit(Category::Sponsor, Amount::from_units(100));
        let mut b = Member::new("b", None, PackageTier::Pro);
        b.wallet.credit(Category::Sponsor, Amount::from_units(90));

        let entries = vec![
            entry("a", 100, EntryStatus::Paid),
            entry("a", 500, EntryStatus::Held),
            entry("b", 100, EntryStatus::Paid),
            entry("ghost", 5, EntryStatus::Paid),
        ];

        let mismatches = audit(&[a, b], &entries);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].member, MemberId::from("b"));
        assert_eq!(mismatches[0].difference(), Amount::from_units(-10));
        assert_eq!(mismatches[1].member, MemberId::from("ghost"));
    }
}
