//! Ledger entries
//!
//! The ledger is append-only: an entry is created once as PAID or HELD and
//! afterwards only its status may move HELD -> PAID or HELD -> BURNED. The
//! amount never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::error::{CommissionError, Result};
use crate::member::MemberId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Direct sponsor bonus
    Sponsor,
    /// Depth commission for upline level k (1-based)
    Depth(u8),
    /// Equal share of the passive pool
    Passive,
    /// Company fund settlement
    Company,
    /// Operator-triggered package commission at level k
    Admin(u8),
}

impl Category {
    pub fn level(&self) -> Option<u8> {
        match self {
            Category::Depth(level) | Category::Admin(level) => Some(*level),
            _ => None,
        }
    }

    /// Whether credits in this category are subject to the earning caps
    pub fn is_capped(&self) -> bool {
        matches!(self, Category::Sponsor | Category::Depth(_) | Category::Admin(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Sponsor => write!(f, "SPONSOR"),
            Category::Depth(level) => write!(f, "DEPTH-{}", level),
            Category::Passive => write!(f, "PASSIVE"),
            Category::Company => write!(f, "COMPANY"),
            Category::Admin(level) => write!(f, "ADMIN-{}", level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Paid,
    Held,
    Burned,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Paid => write!(f, "PAID"),
            EntryStatus::Held => write!(f, "HELD"),
            EntryStatus::Burned => write!(f, "BURNED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub recipient: MemberId,
    pub amount: Amount,
    pub category: Category,
    pub status: EntryStatus,
    /// Correlates the entry with its originating sale or package purchase
    pub reference: String,
    /// Buyer whose purchase produced this entry, if any
    pub source: Option<MemberId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl LedgerEntry {
    pub fn new(
        recipient: MemberId,
        amount: Amount,
        category: Category,
        status: EntryStatus,
        reference: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient,
            amount,
            category,
            status,
            reference: reference.into(),
            source: None,
            description: String::new(),
            created_at,
            processed_at: if status == EntryStatus::Paid {
                Some(created_at)
            } else {
                None
            },
            notes: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: MemberId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_paid(&self) -> bool {
        self.status == EntryStatus::Paid
    }

    pub fn is_held(&self) -> bool {
        self.status == EntryStatus::Held
    }

    /// HELD -> PAID
    pub fn release(&mut self, note: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.transition(EntryStatus::Paid)?;
        self.processed_at = Some(at);
        self.notes.push(note.into());
        Ok(())
    }

    /// HELD -> BURNED
    pub fn burn(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.transition(EntryStatus::Burned)?;
        self.processed_at = Some(at);
        self.notes.push(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: EntryStatus) -> Result<()> {
        if self.status != EntryStatus::Held {
            return Err(CommissionError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Selection for held-entry listings
#[derive(Debug, Clone, Default)]
pub struct HeldFilter {
    pub recipient: Option<MemberId>,
    pub category: Option<Category>,
    pub reference: Option<String>,
    pub created_before: Option<DateTime<Utc>>,
}

impl HeldFilter {
    pub fn for_recipient(recipient: MemberId) -> Self {
        Self {
            recipient: Some(recipient),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        entry.is_held()
            && self.recipient.as_ref().map_or(true, |r| *r == entry.recipient)
            && self.category.map_or(true, |c| c == entry.category)
            && self.reference.as_ref().map_or(true, |r| *r == entry.reference)
            && self.created_before.map_or(true, |t| entry.created_at < t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(amount: i64) -> LedgerEntry {
        LedgerEntry::new(
            "m1".into(),
            Amount::from_units(amount),
            Category::Sponsor,
            EntryStatus::Held,
            "sale:1",
            Utc::now(),
        )
    }

    #[test]
    fn test_release_flow() {
        let mut entry = held(300);
        assert!(entry.processed_at.is_none());

        entry.release("released by monthly reset", Utc::now()).unwrap();
        assert!(entry.is_paid());
        assert!(entry.processed_at.is_some());
        assert_eq!(entry.notes, vec!["released by monthly reset".to_string()]);

        // PAID entries cannot move again
        assert!(entry.release("again", Utc::now()).is_err());
        assert!(entry.burn("nope", Utc::now()).is_err());
    }

    #[test]
    fn test_burn_flow() {
        let mut entry = held(10);
        entry.burn("chargeback", Utc::now()).unwrap();
        assert_eq!(entry.status, EntryStatus::Burned);
        assert!(entry.release("late", Utc::now()).is_err());
        assert_eq!(entry.amount, Amount::from_units(10));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Depth(4).to_string(), "DEPTH-4");
        assert_eq!(Category::Sponsor.to_string(), "SPONSOR");
        assert_eq!(Category::Admin(2).level(), Some(2));
        assert!(!Category::Passive.is_capped());
    }

    #[test]
    fn test_held_filter() {
        let entry = held(5);
        assert!(HeldFilter::default().matches(&entry));
        assert!(HeldFilter::for_recipient("m1".into()).matches(&entry));
        assert!(!HeldFilter::for_recipient("m2".into()).matches(&entry));

        let by_ref = HeldFilter {
            reference: Some("sale:2".into()),
            ..Default::default()
        };
        assert!(!by_ref.matches(&entry));
    }
}
