use serde::{Deserialize, Serialize};

pub const MAX_EVALUATION: f64 = 40.0;
pub const MAX_MISSIONS: f64 = 30.0;
pub const MAX_DISCIPLINE: f64 = 20.0;
pub const MAX_ATTENDANCE: f64 = 10.0;
pub const MAX_TOTAL: f64 = MAX_EVALUATION + MAX_MISSIONS + MAX_DISCIPLINE + MAX_ATTENDANCE;

/// Fraction of `MAX_TOTAL` a student needs before a rank is (re)assigned.
pub const PROMOTION_RATIO: f64 = 0.70;

/// Points per rank level. Coarse on purpose: 100 points only reaches level 3.
pub const RANK_STEP: f64 = 28.0;

/// Ordered rank labels, lowest first.
pub const RANK_TABLE: [&str; 11] = [
    "Recruit",
    "Soldier",
    "Corporal",
    "Sergeant",
    "Sub-Lieutenant",
    "Cadet-Officer",
    "Lieutenant",
    "Captain",
    "Major",
    "Colonel",
    "Student General",
];

pub const LOWEST_RANK: &str = RANK_TABLE[0];

/// Upper clamp only. Negative inputs pass through unchanged.
pub fn clamp_component(value: f64, max: f64) -> f64 {
    if value > max {
        max
    } else {
        value
    }
}

/// Scales by 100 and rounds half away from zero, so ties that sit just below .5 in binary
/// (e.g. 2.675) round up.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn compute_total(evaluation: f64, mission: f64, discipline: f64, attendance: f64) -> f64 {
    round_2_decimals(evaluation + mission + discipline + attendance)
}

pub fn is_promotion_eligible(total: f64) -> bool {
    total >= PROMOTION_RATIO * MAX_TOTAL
}

pub fn rank_level_for_total(total: f64) -> usize {
    let level = (total / RANK_STEP).floor();
    if level.is_nan() || level <= 0.0 {
        return 0;
    }
    (level as usize).min(RANK_TABLE.len() - 1)
}

pub fn rank_for_total(total: f64) -> &'static str {
    RANK_TABLE[rank_level_for_total(total)]
}

/// Raw component values as submitted by a teacher. Missing fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    #[serde(default)]
    pub exam1: f64,
    #[serde(default)]
    pub exam2: f64,
    #[serde(default)]
    pub exam3: f64,
    #[serde(default)]
    pub exam_final: f64,
    #[serde(default)]
    pub missions: f64,
    #[serde(default)]
    pub discipline: f64,
    #[serde(default)]
    pub attendance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedComponents {
    pub evaluation: f64,
    pub missions: f64,
    pub discipline: f64,
    pub attendance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    pub total: f64,
    pub promoted: bool,
    pub new_rank: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub components: ClampedComponents,
    pub outcome: ScoreOutcome,
}

pub fn clamp_submission(sub: &ScoreSubmission) -> ClampedComponents {
    // Only the combined exam sum is capped, never the individual exams.
    let exams = sub.exam1 + sub.exam2 + sub.exam3 + sub.exam_final;
    ClampedComponents {
        evaluation: clamp_component(exams, MAX_EVALUATION),
        missions: clamp_component(sub.missions, MAX_MISSIONS),
        discipline: clamp_component(sub.discipline, MAX_DISCIPLINE),
        attendance: clamp_component(sub.attendance, MAX_ATTENDANCE),
    }
}

pub fn evaluate_submission(sub: &ScoreSubmission) -> ScoreUpdate {
    let components = clamp_submission(sub);
    let total = compute_total(
        components.evaluation,
        components.missions,
        components.discipline,
        components.attendance,
    );
    let promoted = is_promotion_eligible(total);
    let new_rank = if promoted {
        Some(rank_for_total(total))
    } else {
        None
    };
    ScoreUpdate {
        components,
        outcome: ScoreOutcome {
            total,
            promoted,
            new_rank,
        },
    }
}

/// Rank to persist after an update: the new rank on promotion, otherwise the stored one.
pub fn resolve_stored_rank<'a>(outcome: &ScoreOutcome, previous: &'a str) -> &'a str {
    match outcome.new_rank {
        Some(r) => r,
        None => previous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(exams: [f64; 4], missions: f64, discipline: f64, attendance: f64) -> ScoreSubmission {
        ScoreSubmission {
            exam1: exams[0],
            exam2: exams[1],
            exam3: exams[2],
            exam_final: exams[3],
            missions,
            discipline,
            attendance,
        }
    }

    #[test]
    fn clamp_is_idempotent() {
        for x in [-12.5, 0.0, 3.3, 10.0, 10.0001, 45.0, 1e9] {
            for m in [10.0, 20.0, 30.0, 40.0] {
                let once = clamp_component(x, m);
                assert_eq!(clamp_component(once, m), once);
            }
        }
    }

    #[test]
    fn clamp_has_no_floor() {
        assert_eq!(clamp_component(-3.0, 10.0), -3.0);
        assert_eq!(clamp_component(45.0, 30.0), 30.0);
        assert_eq!(clamp_component(30.0, 30.0), 30.0);
    }

    #[test]
    fn total_rounds_to_two_decimals() {
        assert_eq!(compute_total(10.333, 5.0, 5.0, 5.0), 25.33);
        assert_eq!(compute_total(40.0, 30.0, 20.0, 10.0), 100.0);
        assert_eq!(compute_total(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn rounding_scales_before_rounding_half_away_from_zero() {
        assert_eq!(compute_total(2.675, 0.0, 0.0, 0.0), 2.68);
        assert_eq!(compute_total(0.125, 0.0, 0.0, 0.0), 0.13);
        assert_eq!(compute_total(-0.125, 0.0, 0.0, 0.0), -0.13);
        assert!(!is_promotion_eligible(compute_total(69.994, 0.0, 0.0, 0.0)));
        assert!(is_promotion_eligible(compute_total(69.995, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn total_stays_in_bounds_for_clamped_inputs() {
        let grid = [0.0, 0.5, 7.25, 19.99, 50.0];
        for e in grid {
            for m in grid {
                for d in grid {
                    for a in grid {
                        let t = compute_total(
                            clamp_component(e, MAX_EVALUATION),
                            clamp_component(m, MAX_MISSIONS),
                            clamp_component(d, MAX_DISCIPLINE),
                            clamp_component(a, MAX_ATTENDANCE),
                        );
                        assert!((0.0..=100.0).contains(&t), "total {t} out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn promotion_threshold_is_inclusive() {
        assert!(is_promotion_eligible(70.0));
        assert!(!is_promotion_eligible(69.99));
        assert!(is_promotion_eligible(100.0));
    }

    #[test]
    fn rank_boundaries() {
        assert_eq!(rank_for_total(28.0), "Soldier");
        assert_eq!(rank_for_total(27.999), "Recruit");
        assert_eq!(rank_for_total(70.0), "Corporal");
        assert_eq!(rank_for_total(84.0), "Sergeant");
        assert_eq!(rank_for_total(100.0), "Sergeant");
        assert_eq!(rank_for_total(280.0), "Student General");
        assert_eq!(rank_for_total(1e6), "Student General");
        assert_eq!(rank_for_total(-40.0), "Recruit");
    }

    #[test]
    fn rank_is_monotonic() {
        let mut prev = 0usize;
        let mut t = 70.0;
        while t <= 300.0 {
            let level = rank_level_for_total(t);
            assert!(level >= prev, "rank dropped at {t}");
            prev = level;
            t += 0.37;
        }
    }

    #[test]
    fn perfect_submission_promotes() {
        let upd = evaluate_submission(&submission([10.0; 4], 30.0, 20.0, 10.0));
        assert_eq!(upd.outcome.total, 100.0);
        assert!(upd.outcome.promoted);
        assert_eq!(upd.outcome.new_rank, Some(rank_for_total(100.0)));
    }

    #[test]
    fn low_submission_keeps_previous_rank() {
        let upd = evaluate_submission(&submission([5.0; 4], 10.0, 5.0, 2.0));
        assert_eq!(upd.outcome.total, 37.0);
        assert!(!upd.outcome.promoted);
        assert_eq!(upd.outcome.new_rank, None);
        assert_eq!(resolve_stored_rank(&upd.outcome, "Corporal"), "Corporal");
    }

    #[test]
    fn exam_sum_is_clamped_not_each_exam() {
        let upd = evaluate_submission(&submission([15.0; 4], 30.0, 20.0, 10.0));
        assert_eq!(upd.components.evaluation, 40.0);
        assert_eq!(upd.outcome.total, 100.0);

        // A single exam above 10 still counts in full while the sum is under 40.
        let upd = evaluate_submission(&submission([25.0, 0.0, 0.0, 0.0], 0.0, 0.0, 0.0));
        assert_eq!(upd.components.evaluation, 25.0);
    }

    #[test]
    fn over_ceiling_mission_is_clamped() {
        let upd = evaluate_submission(&submission([0.0; 4], 45.0, 0.0, 0.0));
        assert_eq!(upd.components.missions, 30.0);
        assert_eq!(upd.outcome.total, 30.0);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let sub: ScoreSubmission =
            serde_json::from_value(serde_json::json!({ "exam1": 8, "missions": 12.5 }))
                .expect("parse submission");
        assert_eq!(sub.exam1, 8.0);
        assert_eq!(sub.exam_final, 0.0);
        assert_eq!(evaluate_submission(&sub).outcome.total, 20.5);
    }
}
