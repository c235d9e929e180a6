//! Fraud detection
//!
//! Offline scans over a member and ledger snapshot. Findings are advisory:
//! they are logged and reported, never raised as errors, and nothing here
//! reverses ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};
use upline_core::{LedgerEntry, Member, MemberId};

use crate::chain::{children_index, downline_ids};

/// Which check flagged a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudCheck {
    /// Walking the sponsor chain revisits an id. `cycle` is the loop itself,
    /// starting at the first repeated id.
    SponsorLoop { cycle: Vec<MemberId> },
    /// The member's own purchase credited the member
    SelfCredit { entry_ids: Vec<String> },
    /// The member's purchase credited someone in their downline
    DownlineCredit { entry_ids: Vec<String> },
}

impl FraudCheck {
    pub fn name(&self) -> &'static str {
        match self {
            FraudCheck::SponsorLoop { .. } => "sponsor_loop",
            FraudCheck::SelfCredit { .. } => "self_credit",
            FraudCheck::DownlineCredit { .. } => "downline_credit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudFinding {
    pub member: MemberId,
    pub checks: Vec<FraudCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub scanned_members: usize,
    pub scanned_entries: usize,
    pub findings: Vec<FraudFinding>,
    pub generated_at: DateTime<Utc>,
}

impl FraudReport {
    pub fn flagged_members(&self) -> Vec<&MemberId> {
        self.findings.iter().map(|f| &f.member).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn finding(&self, member: &MemberId) -> Option<&FraudFinding> {
        self.findings.iter().find(|f| f.member == *member)
    }
}

#[derive(Debug, Default)]
pub struct FraudDetector;

impl FraudDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run both checks and group the findings per member
    pub fn scan(&self, members: &[Member], entries: &[LedgerEntry], at: DateTime<Utc>) -> FraudReport {
        let mut grouped: BTreeMap<MemberId, Vec<FraudCheck>> = BTreeMap::new();
        for (member, check) in self
            .sponsor_loops(members)
            .into_iter()
            .chain(self.credit_leaks(members, entries))
        {
            grouped.entry(member).or_default().push(check);
        }

        let findings: Vec<FraudFinding> = grouped
            .into_iter()
            .map(|(member, checks)| FraudFinding { member, checks })
            .collect();

        for finding in &findings {
            let names: Vec<&str> = finding.checks.iter().map(|c| c.name()).collect();
            warn!("[FRAUD] Member {} flagged: {}", finding.member, names.join(", "));
        }
        info!(
            "[FRAUD] Scanned {} members and {} entries, {} flagged",
            members.len(),
            entries.len(),
            findings.len()
        );

        FraudReport {
            scanned_members: members.len(),
            scanned_entries: entries.len(),
            findings,
            generated_at: at,
        }
    }

    /// Members whose sponsor walk revisits an id. The walk is bounded by the
    /// member count, which no loop-free chain can exceed.
    pub fn sponsor_loops(&self, members: &[Member]) -> Vec<(MemberId, FraudCheck)> {
        let sponsors: HashMap<&MemberId, Option<&MemberId>> = members
            .iter()
            .map(|m| (&m.id, m.sponsor_id.as_ref()))
            .collect();
        let bound = members.len() + 1;

        let mut flagged = Vec::new();
        for member in members {
            let mut path: Vec<&MemberId> = vec![&member.id];
            let mut seen: HashSet<&MemberId> = HashSet::from([&member.id]);
            let mut next = member.sponsor_id.as_ref();

            while let Some(current) = next {
                if path.len() > bound {
                    break;
                }
                if !seen.insert(current) {
                    let start = path.iter().position(|id| *id == current).unwrap_or(0);
                    let cycle = path[start..].iter().map(|id| (*id).clone()).collect();
                    flagged.push((member.id.clone(), FraudCheck::SponsorLoop { cycle }));
                    break;
                }
                path.push(current);
                next = sponsors.get(current).copied().flatten();
            }
        }
        flagged
    }

    /// Entries originating from a member's purchase that credit the member
    /// or anyone below them
    pub fn credit_leaks(
        &self,
        members: &[Member],
        entries: &[LedgerEntry],
    ) -> Vec<(MemberId, FraudCheck)> {
        let index = children_index(members);
        let mut downlines: HashMap<MemberId, HashSet<MemberId>> = HashMap::new();
        let mut self_credits: BTreeMap<MemberId, Vec<String>> = BTreeMap::new();
        let mut downline_credits: BTreeMap<MemberId, Vec<String>> = BTreeMap::new();

        for entry in entries {
            let source = match &entry.source {
                Some(s) => s,
                None => continue,
            };
            if entry.recipient == *source {
                self_credits
                    .entry(source.clone())
                    .or_default()
                    .push(entry.id.clone());
                continue;
            }
            let downline = downlines
                .entry(source.clone())
                .or_insert_with(|| downline_ids(&index, source));
            if downline.contains(&entry.recipient) {
                downline_credits
                    .entry(source.clone())
                    .or_default()
                    .push(entry.id.clone());
            }
        }

        let mut flagged: Vec<(MemberId, FraudCheck)> = self_credits
            .into_iter()
            .map(|(m, entry_ids)| (m, FraudCheck::SelfCredit { entry_ids }))
            .collect();
        flagged.extend(
            downline_credits
                .into_iter()
                .map(|(m, entry_ids)| (m, FraudCheck::DownlineCredit { entry_ids })),
        );
        flagged
    }
}
