use std::sync::Arc;

use crate::world::plot::{FlagMap, PlotSettings};

/// Fuse the settings of two plots being merged. `lesser` is the plot with the
/// lower id.
///
/// * Flags are unioned. On a key conflict the side holding strictly more
///   flags wins, otherwise `lesser` wins. Both plots end up sharing one `Arc`.
/// * Trusted, members and denied are unioned symmetrically, then denied loses
///   anyone who is trusted or a member.
/// * The first non-empty alias of (`lesser`, `greater`) is copied to both.
/// * Ratings are cleared on both.
pub fn fuse_settings(lesser: &mut PlotSettings, greater: &mut PlotSettings) {
    if !Arc::ptr_eq(&lesser.flags, &greater.flags) {
        let flags = if lesser.flags.len() >= greater.flags.len() {
            union_flags(&lesser.flags, &greater.flags)
        } else {
            union_flags(&greater.flags, &lesser.flags)
        };
        let shared = Arc::new(flags);
        lesser.flags = Arc::clone(&shared);
        greater.flags = shared;
    }

    for (a, b) in [
        (&mut lesser.trusted, &mut greater.trusted),
        (&mut lesser.members, &mut greater.members),
        (&mut lesser.denied, &mut greater.denied),
    ] {
        a.extend(b.iter().copied());
        b.clone_from(a);
    }
    for settings in [&mut *lesser, &mut *greater] {
        let PlotSettings {
            trusted,
            members,
            denied,
            ..
        } = settings;
        denied.retain(|id| !trusted.contains(id) && !members.contains(id));
    }

    if !lesser.alias.is_empty() {
        greater.alias.clone_from(&lesser.alias);
    } else if !greater.alias.is_empty() {
        lesser.alias.clone_from(&greater.alias);
    }

    lesser.ratings.clear();
    greater.ratings.clear();
}

/// `winner`'s entries, followed by every key of `other` that `winner` lacks.
fn union_flags(winner: &FlagMap, other: &FlagMap) -> FlagMap {
    let mut out = winner.clone();
    for (key, value) in other {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn flags(pairs: &[(&str, &str)]) -> Arc<FlagMap> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn larger_flag_set_wins_conflicts_and_is_shared() {
        let mut a = PlotSettings {
            flags: flags(&[("pvp", "false")]),
            ..Default::default()
        };
        let mut b = PlotSettings {
            flags: flags(&[("pvp", "true"), ("time", "6000")]),
            ..Default::default()
        };
        fuse_settings(&mut a, &mut b);
        assert!(Arc::ptr_eq(&a.flags, &b.flags));
        assert_eq!(a.flags.get("pvp").map(String::as_str), Some("true"));
        assert_eq!(a.flags.len(), 2);
    }

    #[test]
    fn tie_goes_to_lesser() {
        let mut a = PlotSettings {
            flags: flags(&[("pvp", "false")]),
            ..Default::default()
        };
        let mut b = PlotSettings {
            flags: flags(&[("pvp", "true")]),
            ..Default::default()
        };
        fuse_settings(&mut a, &mut b);
        assert_eq!(b.flags.get("pvp").map(String::as_str), Some("false"));
    }

    #[test]
    fn membership_union_strips_denied() {
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);
        let eve = Uuid::from_u128(3);
        let mut a = PlotSettings::default();
        a.trusted.insert(alice);
        a.denied.insert(bob);
        a.denied.insert(eve);
        a.ratings.insert(alice, 7);
        let mut b = PlotSettings::default();
        b.members.insert(bob);
        b.alias = "spawn".into();

        fuse_settings(&mut a, &mut b);
        for s in [&a, &b] {
            assert!(s.trusted.contains(&alice));
            assert!(s.members.contains(&bob));
            assert!(!s.denied.contains(&bob));
            assert!(s.denied.contains(&eve));
            assert!(s.ratings.is_empty());
            assert_eq!(s.alias, "spawn");
        }
    }
}
