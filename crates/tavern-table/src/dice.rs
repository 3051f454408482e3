//! Dice simulation.
//!
//! [`DiceRoller`] throws dice; [`RollRequest`] describes a roll and checks
//! it against the table limits; [`RollOutcome`] carries the arithmetic that
//! ends up in the audit record.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tavern_protocol::{DiceType, ProtocolError};

use crate::TableConfig;

/// A uniform dice source. Seedable for reproducible tests.
#[derive(Debug, Clone)]
pub struct DiceRoller {
    rng: StdRng,
}

impl DiceRoller {
    /// A roller seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// A roller that always produces the same sequence for `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Throws `count` dice of one type. Every face is in `1..=sides`.
    pub fn throw(&mut self, dice_type: DiceType, count: u32) -> Vec<u32> {
        let sides = dice_type.sides();
        (0..count).map(|_| self.rng.random_range(1..=sides)).collect()
    }
}

// ---------------------------------------------------------------------------
// RollRequest
// ---------------------------------------------------------------------------

/// What a caller asks to roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    pub dice_type: DiceType,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub modifier: i32,
    #[serde(default)]
    pub skill_name: Option<String>,
    /// Success when `final_result >= success_threshold`.
    #[serde(default)]
    pub success_threshold: Option<i64>,
}

fn default_count() -> u32 {
    1
}

impl RollRequest {
    /// One die of `dice_type`, no modifier.
    pub fn new(dice_type: DiceType) -> Self {
        Self {
            dice_type,
            count: 1,
            modifier: 0,
            skill_name: None,
            success_threshold: None,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn skill(mut self, skill_name: impl Into<String>) -> Self {
        self.skill_name = Some(skill_name.into());
        self
    }

    pub fn threshold(mut self, threshold: i64) -> Self {
        self.success_threshold = Some(threshold);
        self
    }

    /// Checks count and modifier against the limits and normalizes the
    /// skill name (trimmed; blank becomes `None`).
    pub fn validate(mut self, config: &TableConfig) -> Result<Self, ProtocolError> {
        ProtocolError::check_range(
            "count",
            i64::from(self.count),
            1,
            i64::from(config.max_dice_count),
        )?;
        ProtocolError::check_range(
            "modifier",
            i64::from(self.modifier),
            -i64::from(config.max_modifier),
            i64::from(config.max_modifier),
        )?;
        self.skill_name = self
            .skill_name
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// RollOutcome
// ---------------------------------------------------------------------------

/// The evaluated result of a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub rolls: Vec<u32>,
    pub total: u32,
    pub final_result: i64,
    pub success: Option<bool>,
}

impl RollOutcome {
    /// Sums the faces and decides success.
    ///
    /// With a threshold, success is `final_result >= threshold`. Without
    /// one, a d20 skill check uses `default_difficulty`. Anything else has
    /// no success value.
    pub fn evaluate(request: &RollRequest, rolls: Vec<u32>, default_difficulty: i64) -> Self {
        let total: u32 = rolls.iter().sum();
        let final_result = i64::from(total) + i64::from(request.modifier);
        let threshold = match request.success_threshold {
            Some(t) => Some(t),
            None if request.dice_type == DiceType::D20 && request.skill_name.is_some() => {
                Some(default_difficulty)
            }
            None => None,
        };
        Self {
            rolls,
            total,
            final_result,
            success: threshold.map(|t| final_result >= t),
        }
    }
}

/// The text of the system message posted for a roll, for example
/// `Rolled 3d6 + 2 for Stealth: [4, 1, 6] = 13 (Success)`.
pub fn announcement(request: &RollRequest, outcome: &RollOutcome) -> String {
    let mut text = format!("Rolled {}{}", request.count, request.dice_type);
    if request.modifier > 0 {
        text.push_str(&format!(" + {}", request.modifier));
    } else if request.modifier < 0 {
        text.push_str(&format!(" - {}", request.modifier.unsigned_abs()));
    }
    if let Some(skill) = &request.skill_name {
        text.push_str(&format!(" for {skill}"));
    }
    text.push_str(&format!(": {:?} = {}", outcome.rolls, outcome.final_result));
    match outcome.success {
        Some(true) => text.push_str(" (Success)"),
        Some(false) => text.push_str(" (Failure)"),
        None => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throw_faces_in_range() {
        let mut roller = DiceRoller::from_seed(7);
        for dice in DiceType::ALL {
            let rolls = roller.throw(dice, 10);
            assert_eq!(rolls.len(), 10);
            assert!(rolls.iter().all(|r| (1..=dice.sides()).contains(r)));
        }
    }

    #[test]
    fn test_throw_same_seed_same_sequence() {
        let a = DiceRoller::from_seed(99).throw(DiceType::D100, 10);
        let b = DiceRoller::from_seed(99).throw(DiceType::D100, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_rejects_count_out_of_range() {
        let config = TableConfig::default();
        assert!(RollRequest::new(DiceType::D6).count(0).validate(&config).is_err());
        assert!(RollRequest::new(DiceType::D6).count(11).validate(&config).is_err());
        assert!(RollRequest::new(DiceType::D6).count(10).validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_modifier_out_of_range() {
        let config = TableConfig::default();
        assert!(RollRequest::new(DiceType::D6).modifier(21).validate(&config).is_err());
        assert!(RollRequest::new(DiceType::D6).modifier(-21).validate(&config).is_err());
        assert!(RollRequest::new(DiceType::D6).modifier(-20).validate(&config).is_ok());
    }

    #[test]
    fn test_validate_blank_skill_becomes_none() {
        let config = TableConfig::default();
        let req = RollRequest::new(DiceType::D20).skill("   ").validate(&config).unwrap();
        assert!(req.skill_name.is_none());
        let req = RollRequest::new(DiceType::D20).skill(" Stealth ").validate(&config).unwrap();
        assert_eq!(req.skill_name.as_deref(), Some("Stealth"));
    }

    #[test]
    fn test_evaluate_threshold_decides_success() {
        let req = RollRequest::new(DiceType::D6).count(3).modifier(2).threshold(12);
        let outcome = RollOutcome::evaluate(&req, vec![4, 1, 6], 10);
        assert_eq!(outcome.total, 11);
        assert_eq!(outcome.final_result, 13);
        assert_eq!(outcome.success, Some(true));

        let outcome = RollOutcome::evaluate(&req, vec![1, 1, 1], 10);
        assert_eq!(outcome.final_result, 5);
        assert_eq!(outcome.success, Some(false));
    }

    #[test]
    fn test_evaluate_threshold_is_inclusive() {
        let req = RollRequest::new(DiceType::D6).threshold(4);
        let outcome = RollOutcome::evaluate(&req, vec![4], 10);
        assert_eq!(outcome.success, Some(true));
    }

    #[test]
    fn test_evaluate_d20_skill_uses_default_difficulty() {
        let req = RollRequest::new(DiceType::D20).skill("Perception");
        assert_eq!(RollOutcome::evaluate(&req, vec![10], 10).success, Some(true));
        assert_eq!(RollOutcome::evaluate(&req, vec![9], 10).success, Some(false));
    }

    #[test]
    fn test_evaluate_plain_roll_has_no_success() {
        let req = RollRequest::new(DiceType::D20);
        assert_eq!(RollOutcome::evaluate(&req, vec![20], 10).success, None);
        let req = RollRequest::new(DiceType::D6).skill("Stealth");
        assert_eq!(RollOutcome::evaluate(&req, vec![6], 10).success, None);
    }

    #[test]
    fn test_announcement_format() {
        let req = RollRequest::new(DiceType::D6)
            .count(3)
            .modifier(2)
            .skill("Stealth")
            .threshold(12);
        let outcome = RollOutcome::evaluate(&req, vec![4, 1, 6], 10);
        assert_eq!(
            announcement(&req, &outcome),
            "Rolled 3d6 + 2 for Stealth: [4, 1, 6] = 13 (Success)"
        );
    }

    #[test]
    fn test_announcement_negative_modifier_no_success() {
        let req = RollRequest::new(DiceType::D8).modifier(-3);
        let outcome = RollOutcome::evaluate(&req, vec![2], 10);
        assert_eq!(announcement(&req, &outcome), "Rolled 1d8 - 3: [2] = -1");
    }

    #[test]
    fn test_roll_request_deserializes_with_defaults() {
        let req: RollRequest = serde_json::from_str(r#"{"dice_type": "d20"}"#).unwrap();
        assert_eq!(req, RollRequest::new(DiceType::D20));
    }
}
