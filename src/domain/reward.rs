use serde::Serialize;

/// How a post's total reward divides between broad contributors and the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardSplit {
    pub contributor: u64,
    pub solver: u64,
}

impl RewardSplit {
    pub fn total(&self) -> u64 {
        self.contributor + self.solver
    }
}

/// Split `total` by contributor share `ratio`.
///
/// The contributor amount is rounded half-up and the solver takes the
/// remainder, so the two always sum to `total`. Ratios outside [0, 1] are
/// clamped and NaN counts as 0.
pub fn split_reward(total: u64, ratio: f64) -> RewardSplit {
    let ratio = if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    };

    let contributor = ((total as f64) * ratio + 0.5).floor() as u64;
    let contributor = contributor.min(total);

    RewardSplit {
        contributor,
        solver: total - contributor,
    }
}

/// Lenient form-field parse: anything non-numeric or negative becomes 0.
pub fn parse_reward_input(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return v;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.floor() as u64,
        _ => 0,
    }
}

/// Lenient ratio parse for the slider value.
pub fn parse_ratio_input(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_total_halves_cleanly() {
        let split = split_reward(400, 0.5);
        assert_eq!(split.contributor, 200);
        assert_eq!(split.solver, 200);
    }

    #[test]
    fn odd_total_rounds_half_up_for_contributor() {
        let split = split_reward(401, 0.5);
        assert_eq!(split.contributor, 201);
        assert_eq!(split.solver, 200);
    }

    #[test]
    fn sum_is_preserved_across_ratios() {
        for total in [0u64, 1, 7, 99, 400, 401, 12_345] {
            for step in 0..=20 {
                let ratio = step as f64 / 20.0;
                let split = split_reward(total, ratio);
                assert_eq!(split.total(), total, "total={total} ratio={ratio}");
            }
        }
    }

    #[test]
    fn out_of_range_ratio_is_clamped() {
        assert_eq!(split_reward(100, 1.5).contributor, 100);
        assert_eq!(split_reward(100, -0.2).contributor, 0);
        assert_eq!(split_reward(100, f64::NAN).contributor, 0);
    }

    #[test]
    fn non_numeric_input_is_zero() {
        assert_eq!(parse_reward_input("abc"), 0);
        assert_eq!(parse_reward_input(""), 0);
        assert_eq!(parse_reward_input("-5"), 0);
        assert_eq!(parse_reward_input(" 250 "), 250);
        assert_eq!(parse_reward_input("12.9"), 12);
    }

    #[test]
    fn ratio_input_is_lenient() {
        assert_eq!(parse_ratio_input("0.25"), 0.25);
        assert_eq!(parse_ratio_input("x"), 0.0);
        assert_eq!(parse_ratio_input("3"), 1.0);
    }
}
