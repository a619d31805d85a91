//! The team-assignment rolls: balanced split, color, and music.
//!
//! Pure functions over a caller-supplied RNG so the lobby actor stays
//! thin and the fairness properties are directly testable.

use rand::Rng;
use std::ops::RangeInclusive;

/// Splits `count` members into two teams, walking the (already shuffled)
/// member order once.
///
/// For each member, `diff = count1 - count2` decides: behind team gets the
/// member, a tie is broken by a fair coin. The returned vector holds one
/// `(team, position)` pair per member, where `position` is the pre-increment
/// count of the chosen team. Every prefix of the walk differs by at most
/// one member between teams, so the final split is balanced.
pub(crate) fn balanced_split<R: Rng>(count: usize, rng: &mut R) -> Vec<(u16, u16)> {
    let mut count1: u16 = 0;
    let mut count2: u16 = 0;
    let mut assignments = Vec::with_capacity(count);

    for _ in 0..count {
        let team = match count1.cmp(&count2) {
            std::cmp::Ordering::Equal => {
                if rng.random_bool(0.5) {
                    1
                } else {
                    2
                }
            }
            std::cmp::Ordering::Less => 1,
            std::cmp::Ordering::Greater => 2,
        };
        if team == 1 {
            assignments.push((1, count1));
            count1 += 1;
        } else {
            assignments.push((2, count2));
            count2 += 1;
        }
    }

    assignments
}

/// Rolls a color-combination id uniformly from `ids`, re-rolling while the
/// result equals `previous` so consecutive matches in the same lobby never
/// repeat a color scheme. A single-candidate range cannot avoid repeats and
/// is returned as-is.
pub(crate) fn roll_color<R: Rng>(
    ids: &RangeInclusive<u16>,
    previous: Option<u16>,
    rng: &mut R,
) -> u16 {
    if ids.start() == ids.end() {
        return *ids.start();
    }
    loop {
        let color = rng.random_range(ids.clone());
        if Some(color) != previous {
            return color;
        }
    }
}

/// Rolls a music-track id uniformly from `ids`. No repeat constraint.
pub(crate) fn roll_music<R: Rng>(ids: &RangeInclusive<u16>, rng: &mut R) -> u16 {
    rng.random_range(ids.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_split_sizes_differ_by_at_most_one() {
        let mut rng = rand::rng();
        for count in 1..=9 {
            let assignments = balanced_split(count, &mut rng);
            let team1 = assignments.iter().filter(|(t, _)| *t == 1).count();
            let team2 = assignments.iter().filter(|(t, _)| *t == 2).count();
            assert_eq!(team1 + team2, count);
            assert!(
                team1.abs_diff(team2) <= 1,
                "count={count}: split {team1}/{team2} is unbalanced"
            );
        }
    }

    #[test]
    fn test_balanced_split_every_prefix_is_balanced() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let assignments = balanced_split(8, &mut rng);
            let mut team1 = 0i32;
            let mut team2 = 0i32;
            for (team, _) in &assignments {
                if *team == 1 { team1 += 1 } else { team2 += 1 }
                assert!((team1 - team2).abs() <= 1, "prefix drifted past one");
            }
        }
    }

    #[test]
    fn test_balanced_split_positions_are_pre_increment_counts() {
        let mut rng = rand::rng();
        let assignments = balanced_split(6, &mut rng);

        for team in [1u16, 2u16] {
            let positions: Vec<u16> = assignments
                .iter()
                .filter(|(t, _)| *t == team)
                .map(|(_, p)| *p)
                .collect();
            let expected: Vec<u16> = (0..positions.len() as u16).collect();
            assert_eq!(positions, expected, "team {team} positions not dense");
        }
    }

    #[test]
    fn test_balanced_split_ties_use_both_teams_eventually() {
        // With a fair coin on the first member, 200 runs landing on one
        // team every time would be a broken tie-break (p ≈ 2^-200).
        let mut rng = rand::rng();
        let mut saw = [false, false];
        for _ in 0..200 {
            let first = balanced_split(2, &mut rng)[0].0;
            saw[(first - 1) as usize] = true;
        }
        assert!(saw[0] && saw[1], "tie-break never chose one of the teams");
    }

    #[test]
    fn test_roll_color_never_repeats_previous() {
        let mut rng = rand::rng();
        let ids = 1..=4;
        let mut previous = None;
        for _ in 0..100 {
            let color = roll_color(&ids, previous, &mut rng);
            assert!(ids.contains(&color));
            assert_ne!(Some(color), previous);
            previous = Some(color);
        }
    }

    #[test]
    fn test_roll_color_single_candidate_is_allowed_to_repeat() {
        let mut rng = rand::rng();
        let color = roll_color(&(3..=3), Some(3), &mut rng);
        assert_eq!(color, 3);
    }

    #[test]
    fn test_roll_music_stays_in_range() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let music = roll_music(&(1..=2), &mut rng);
            assert!((1..=2).contains(&music));
        }
    }
}
