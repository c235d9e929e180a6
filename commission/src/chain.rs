//! Sponsor chain and downline walks
//!
//! The sponsorship graph is a parent-pointer forest that may contain bad
//! data (loops, dangling sponsors). Walks here are iterative, bounded and
//! guarded by a visited set, so they always terminate.

use std::collections::{HashMap, HashSet, VecDeque};
use upline_core::{Member, MemberDirectory, MemberId, Result};

/// One ancestor in an upline, level 1 being the direct sponsor
#[derive(Debug, Clone, PartialEq)]
pub struct UplineLink {
    pub member: Member,
    pub level: u8,
}

/// Walk the sponsor pointer upward from `member_id`.
///
/// Stops at the root, at `max_depth`, at a dangling sponsor reference, or at
/// the first id seen twice. A loop is not an error here; it is reported by
/// the fraud scan.
pub fn resolve_upline<D: MemberDirectory + ?Sized>(
    directory: &D,
    member_id: &MemberId,
    max_depth: u8,
) -> Result<Vec<UplineLink>> {
    let mut chain = Vec::new();
    let start = match directory.member(member_id)? {
        Some(m) => m,
        None => return Ok(chain),
    };

    let mut visited: HashSet<MemberId> = HashSet::new();
    visited.insert(start.id.clone());
    let mut next = start.sponsor_id;
    let mut level: u8 = 1;

    while let Some(sponsor_id) = next {
        if level > max_depth || !visited.insert(sponsor_id.clone()) {
            break;
        }
        let sponsor = match directory.member(&sponsor_id)? {
            Some(m) => m,
            None => break,
        };
        next = sponsor.sponsor_id.clone();
        chain.push(UplineLink {
            member: sponsor,
            level,
        });
        level = level.saturating_add(1);
    }

    Ok(chain)
}

/// Sponsor id -> directly sponsored ids
pub fn children_index<'a, I>(members: I) -> HashMap<MemberId, Vec<MemberId>>
where
    I: IntoIterator<Item = &'a Member>,
{
    let mut index: HashMap<MemberId, Vec<MemberId>> = HashMap::new();
    for member in members {
        if let Some(sponsor) = &member.sponsor_id {
            index
                .entry(sponsor.clone())
                .or_default()
                .push(member.id.clone());
        }
    }
    index
}

/// Every member below `root`, excluding `root` itself even when a loop leads
/// back to it.
pub fn downline_ids(index: &HashMap<MemberId, Vec<MemberId>>, root: &MemberId) -> HashSet<MemberId> {
    let mut seen: HashSet<MemberId> = HashSet::new();
    let mut queue: VecDeque<&MemberId> = VecDeque::new();
    queue.push_back(root);

    while let Some(current) = queue.pop_front() {
        if let Some(children) = index.get(current) {
            for child in children {
                if child != root && seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
    }

    seen
}

/// Size of the team below `root`
pub fn team_size(index: &HashMap<MemberId, Vec<MemberId>>, root: &MemberId) -> usize {
    downline_ids(index, root).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use upline_core::{MemberSnapshot, PackageTier};

    fn member(id: &str, sponsor: Option<&str>) -> Member {
        Member::new(id, sponsor.map(MemberId::from), PackageTier::Basic)
    }

    fn ids(chain: &[UplineLink]) -> Vec<(String, u8)> {
        chain
            .iter()
            .map(|l| (l.member.id.to_string(), l.level))
            .collect()
    }

    #[test]
    fn test_linear_chain() {
        let snapshot: MemberSnapshot = vec![
            member("root", None),
            member("g", Some("root")),
            member("s", Some("g")),
            member("buyer", Some("s")),
        ]
        .into_iter()
        .collect();

        let chain = resolve_upline(&snapshot, &"buyer".into(), 7).unwrap();
        assert_eq!(
            ids(&chain),
            vec![("s".into(), 1), ("g".into(), 2), ("root".into(), 3)]
        );
    }

    #[test]
    fn test_depth_bound() {
        let snapshot: MemberSnapshot = vec![
            member("a", None),
            member("b", Some("a")),
            member("c", Some("b")),
            member("d", Some("c")),
        ]
        .into_iter()
        .collect();

        let chain = resolve_upline(&snapshot, &"d".into(), 2).unwrap();
        assert_eq!(ids(&chain), vec![("c".into(), 1), ("b".into(), 2)]);
        assert!(resolve_upline(&snapshot, &"d".into(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_loop_terminates() {
        // A -> B -> A
        let snapshot: MemberSnapshot = vec![member("a", Some("b")), member("b", Some("a"))]
            .into_iter()
            .collect();

        let chain = resolve_upline(&snapshot, &"a".into(), 50).unwrap();
        assert_eq!(ids(&chain), vec![("b".into(), 1)]);
    }

    #[test]
    fn test_dangling_sponsor_stops_walk() {
        let snapshot: MemberSnapshot = vec![member("a", Some("gone")), member("b", Some("a"))]
            .into_iter()
            .collect();

        let chain = resolve_upline(&snapshot, &"b".into(), 7).unwrap();
        assert_eq!(ids(&chain), vec![("a".into(), 1)]);
    }

    #[test]
    fn test_unknown_member_yields_empty_chain() {
        let snapshot = MemberSnapshot::new();
        assert!(resolve_upline(&snapshot, &"nobody".into(), 7).unwrap().is_empty());
    }

    #[test]
    fn test_downline_and_team_size() {
        let members = vec![
            member("root", None),
            member("a", Some("root")),
            member("b", Some("root")),
            member("c", Some("a")),
            member("d", Some("c")),
            member("x", None),
        ];
        let index = children_index(&members);

        let down = downline_ids(&index, &"root".into());
        assert_eq!(down.len(), 4);
        assert!(down.contains(&MemberId::from("d")));
        assert!(!down.contains(&MemberId::from("x")));
        assert_eq!(team_size(&index, &"a".into()), 2);
        assert_eq!(team_size(&index, &"d".into()), 0);
    }

    #[test]
    fn test_downline_with_cycle() {
        let members = vec![member("a", Some("c")), member("b", Some("a")), member("c", Some("b"))];
        let index = children_index(&members);

        let down = downline_ids(&index, &"a".into());
        assert_eq!(down.len(), 2);
        assert!(!down.contains(&MemberId::from("a")));
    }
}
