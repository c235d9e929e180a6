//! Members, package tiers and wallet snapshots
//!
//! Member records are owned by the member store collaborator. The engine only
//! reads sponsorship/tier data and mutates the wallet through ledger entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::amount::Amount;
use crate::error::Result;
use crate::ledger::Category;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        MemberId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        MemberId(s.to_string())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        MemberId(s)
    }
}

/// Purchased package tier; drives the earning caps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageTier {
    #[default]
    None,
    Basic,
    Pro,
    Elite,
}

impl fmt::Display for PackageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageTier::None => write!(f, "NONE"),
            PackageTier::Basic => write!(f, "BASIC"),
            PackageTier::Pro => write!(f, "PRO"),
            PackageTier::Elite => write!(f, "ELITE"),
        }
    }
}

/// Free members never receive or trigger commissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Free,
    #[default]
    Paid,
}

/// Wallet snapshot kept on the member record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Amount,
    pub total_earnings: Amount,
    pub sponsor_earnings: Amount,
    pub depth_earnings: Amount,
    pub passive_earnings: Amount,
    pub company_earnings: Amount,
    pub admin_earnings: Amount,
    /// Rolling counter, zeroed by the daily reset
    pub daily_earnings: Amount,
    /// Rolling counter, zeroed by the monthly reset
    pub monthly_earnings: Amount,
}

impl Wallet {
    /// Credit a PAID amount: balance, lifetime total and category sub-total
    pub fn credit(&mut self, category: Category, amount: Amount) {
        self.balance += amount;
        self.total_earnings += amount;
        *self.category_total_mut(category) += amount;
    }

    pub fn category_total(&self, category: Category) -> Amount {
        match category {
            Category::Sponsor => self.sponsor_earnings,
            Category::Depth(_) => self.depth_earnings,
            Category::Passive => self.passive_earnings,
            Category::Company => self.company_earnings,
            Category::Admin(_) => self.admin_earnings,
        }
    }

    fn category_total_mut(&mut self, category: Category) -> &mut Amount {
        match category {
            Category::Sponsor => &mut self.sponsor_earnings,
            Category::Depth(_) => &mut self.depth_earnings,
            Category::Passive => &mut self.passive_earnings,
            Category::Company => &mut self.company_earnings,
            Category::Admin(_) => &mut self.admin_earnings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub sponsor_id: Option<MemberId>,
    pub tier: PackageTier,
    pub active: bool,
    pub membership: Membership,
    #[serde(default)]
    pub wallet: Wallet,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, sponsor_id: Option<MemberId>, tier: PackageTier) -> Self {
        Self {
            id: id.into(),
            sponsor_id,
            tier,
            active: true,
            membership: Membership::Paid,
            wallet: Wallet::default(),
        }
    }

    /// Active, on a paid package, and not a free member
    pub fn is_eligible(&self) -> bool {
        self.active && self.tier != PackageTier::None && self.membership != Membership::Free
    }
}

/// Read access to the member store.
///
/// Implemented by the persistent store and by [`MemberSnapshot`].
pub trait MemberDirectory {
    fn member(&self, id: &MemberId) -> Result<Option<Member>>;

    fn members(&self) -> Result<Vec<Member>>;

    fn sponsored_by(&self, sponsor: &MemberId) -> Result<Vec<Member>> {
        Ok(self
            .members()?
            .into_iter()
            .filter(|m| m.sponsor_id.as_ref() == Some(sponsor))
            .collect())
    }
}

/// In-memory member set, used for pure calculation and offline scans
#[derive(Debug, Clone, Default)]
pub struct MemberSnapshot {
    members: HashMap<MemberId, Member>,
}

impl MemberSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }
}

impl FromIterator<Member> for MemberSnapshot {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        let mut snapshot = MemberSnapshot::new();
        for member in iter {
            snapshot.insert(member);
        }
        snapshot
    }
}

impl MemberDirectory for MemberSnapshot {
    fn member(&self, id: &MemberId) -> Result<Option<Member>> {
        Ok(self.members.get(id).cloned())
    }

    fn members(&self) -> Result<Vec<Member>> {
        Ok(self.members.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility() {
        let mut m = Member::new("a", None, PackageTier::Basic);
        assert!(m.is_eligible());

        m.active = false;
        assert!(!m.is_eligible());

        m.active = true;
        m.membership = Membership::Free;
        assert!(!m.is_eligible());

        let none = Member::new("b", None, PackageTier::None);
        assert!(!none.is_eligible());
    }

    #[test]
    fn test_wallet_credit_updates_category() {
        let mut w = Wallet::default();
        w.credit(Category::Depth(3), Amount::from_units(10));
        w.credit(Category::Sponsor, Amount::from_units(5));

        assert_eq!(w.balance, Amount::from_units(15));
        assert_eq!(w.total_earnings, Amount::from_units(15));
        assert_eq!(w.category_total(Category::Depth(1)), Amount::from_units(10));
        assert_eq!(w.sponsor_earnings, Amount::from_units(5));
        assert_eq!(w.daily_earnings, Amount::ZERO);
    }

    #[test]
    fn test_snapshot_sponsored_by() {
        let snapshot: MemberSnapshot = vec![
            Member::new("root", None, PackageTier::Elite),
            Member::new("a", Some("root".into()), PackageTier::Basic),
            Member::new("b", Some("root".into()), PackageTier::Pro),
            Member::new("c", Some("a".into()), PackageTier::Pro),
        ]
        .into_iter()
        .collect();

        let mut children: Vec<_> = snapshot
            .sponsored_by(&"root".into())
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        children.sort();
        assert_eq!(children, vec![MemberId::from("a"), MemberId::from("b")]);
    }

    #[test]
    fn test_tier_serde() {
        assert_eq!(serde_json::to_string(&PackageTier::Elite).unwrap(), "\"ELITE\"");
        let t: PackageTier = serde_json::from_str("\"BASIC\"").unwrap();
        assert_eq!(t, PackageTier::Basic);
    }
}
