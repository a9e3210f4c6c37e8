//! Rules for dividing an expense total into per-participant shares.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::ValidationError;
use super::money::Money;
use super::primitives::ParticipantId;

/// One participant's fixed share, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactShare {
    pub participant: ParticipantId,
    pub minor: i64,
}

/// One participant's percentage of the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentShare {
    pub participant: ParticipantId,
    pub percent: Decimal,
}

/// How an expense is divided among its sharers.
///
/// Every variant yields shares that sum exactly to the expense total. Leftover
/// minor units are handed out one at a time to the first-listed sharers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SplitStrategy {
    #[default]
    Equal,
    Exact {
        shares: Vec<ExactShare>,
    },
    Percentage {
        percentages: Vec<PercentShare>,
    },
}

impl SplitStrategy {
    /// Compute each sharer's share of `total`, in sharer order.
    pub fn shares(
        &self,
        total: Money,
        sharers: &[ParticipantId],
    ) -> Result<Vec<(ParticipantId, Money)>, ValidationError> {
        if sharers.is_empty() {
            return Err(ValidationError::EmptySharers);
        }
        let mut seen = HashSet::with_capacity(sharers.len());
        for id in sharers {
            if !seen.insert(*id) {
                return Err(ValidationError::DuplicateSharer(*id));
            }
        }

        let minors = match self {
            SplitStrategy::Equal => split_equal(total.minor(), sharers.len()),
            SplitStrategy::Exact { shares } => split_exact(total.minor(), sharers, shares)?,
            SplitStrategy::Percentage { percentages } => {
                split_percentage(total.minor(), sharers, percentages)?
            }
        };

        Ok(sharers
            .iter()
            .copied()
            .zip(minors)
            .map(|(id, minor)| (id, Money::new(minor, total.currency())))
            .collect())
    }

    pub fn name(&self) -> &'static str {
        match self {
            SplitStrategy::Equal => "equal",
            SplitStrategy::Exact { .. } => "exact",
            SplitStrategy::Percentage { .. } => "percentage",
        }
    }
}

fn split_equal(total: i64, n: usize) -> Vec<i64> {
    let n = n as i64;
    let base = total.div_euclid(n);
    distribute_remainder(total, vec![base; n as usize])
}

/// Hand the units `raw` is short of `total` out round-robin from the front.
fn distribute_remainder(total: i64, mut raw: Vec<i64>) -> Vec<i64> {
    let mut remainder = total - raw.iter().sum::<i64>();
    let len = raw.len();
    let mut i = 0;
    while remainder > 0 {
        raw[i % len] += 1;
        remainder -= 1;
        i += 1;
    }
    raw
}

fn lookup<'a, T>(
    sharers: &[ParticipantId],
    entries: &'a [T],
    key: impl Fn(&T) -> ParticipantId,
) -> Result<Vec<&'a T>, ValidationError> {
    if entries.len() != sharers.len() {
        return Err(ValidationError::InvalidSplit(format!(
            "{} shares given for {} sharers",
            entries.len(),
            sharers.len()
        )));
    }
    sharers
        .iter()
        .map(|id| {
            let mut matching = entries.iter().filter(|e| key(*e) == *id);
            match (matching.next(), matching.next()) {
                (Some(entry), None) => Ok(entry),
                (None, _) => Err(ValidationError::InvalidSplit(format!(
                    "no share given for participant {}",
                    id
                ))),
                (Some(_), Some(_)) => Err(ValidationError::DuplicateSharer(*id)),
            }
        })
        .collect()
}

fn split_exact(
    total: i64,
    sharers: &[ParticipantId],
    shares: &[ExactShare],
) -> Result<Vec<i64>, ValidationError> {
    let ordered = lookup(sharers, shares, |s| s.participant)?;
    if let Some(negative) = ordered.iter().find(|s| s.minor < 0) {
        return Err(ValidationError::InvalidSplit(format!(
            "negative share for participant {}",
            negative.participant
        )));
    }
    let minors: Vec<i64> = ordered.iter().map(|s| s.minor).collect();
    let sum = minors
        .iter()
        .try_fold(0i64, |acc, m| acc.checked_add(*m))
        .ok_or(ValidationError::AmountOverflow)?;
    if sum != total {
        return Err(ValidationError::ShareMismatch {
            expected: total,
            actual: sum,
        });
    }
    Ok(minors)
}

fn split_percentage(
    total: i64,
    sharers: &[ParticipantId],
    percentages: &[PercentShare],
) -> Result<Vec<i64>, ValidationError> {
    let ordered = lookup(sharers, percentages, |p| p.participant)?;
    if let Some(negative) = ordered.iter().find(|p| p.percent.is_sign_negative()) {
        return Err(ValidationError::InvalidSplit(format!(
            "negative percentage for participant {}",
            negative.participant
        )));
    }

    let sum = ordered
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.percent))
        .ok_or(ValidationError::AmountOverflow)?;
    let total_dec = Decimal::from(total);
    // Tolerate rounding in the percentages as long as it moves at most one minor unit.
    // A drift too large to represent is a mismatch all the same.
    let within_tolerance = (sum - Decimal::ONE_HUNDRED)
        .abs()
        .checked_mul(total_dec)
        .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
        .is_some_and(|drift| drift <= Decimal::ONE);
    if sum.is_zero() || !within_tolerance {
        return Err(ValidationError::PercentageMismatch(sum.normalize().to_string()));
    }

    let raw = ordered
        .iter()
        .map(|p| {
            total_dec
                .checked_mul(p.percent)
                .and_then(|d| d.checked_div(sum))
                .and_then(|d| d.floor().to_i64())
                .ok_or(ValidationError::AmountOverflow)
        })
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(distribute_remainder(total, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use std::str::FromStr;

    fn ids(raw: &[i64]) -> Vec<ParticipantId> {
        raw.iter().copied().map(ParticipantId).collect()
    }

    fn minors(shares: &[(ParticipantId, Money)]) -> Vec<i64> {
        shares.iter().map(|(_, m)| m.minor()).collect()
    }

    fn pct(p: i64, s: &str) -> PercentShare {
        PercentShare {
            participant: ParticipantId(p),
            percent: Decimal::from_str(s).unwrap(),
        }
    }

    #[test]
    fn test_equal_split_remainder_goes_to_first_listed() {
        let total = Money::new(100, Currency::EUR);
        let shares = SplitStrategy::Equal.shares(total, &ids(&[1, 2, 3])).unwrap();
        assert_eq!(minors(&shares), vec![34, 33, 33]);

        let shares = SplitStrategy::Equal
            .shares(Money::new(101, Currency::EUR), &ids(&[3, 1, 2]))
            .unwrap();
        assert_eq!(shares[0].0, ParticipantId(3));
        assert_eq!(minors(&shares), vec![34, 34, 33]);
    }

    #[test]
    fn test_equal_split_sums_to_total() {
        for total in 1..250 {
            for n in 1..8 {
                let sharers: Vec<ParticipantId> = (1..=n).map(ParticipantId).collect();
                let shares = SplitStrategy::Equal
                    .shares(Money::new(total, Currency::EUR), &sharers)
                    .unwrap();
                let sum: i64 = minors(&shares).iter().sum();
                assert_eq!(sum, total, "total {} among {}", total, n);
            }
        }
    }

    #[test]
    fn test_empty_and_duplicate_sharers() {
        let total = Money::new(100, Currency::EUR);
        assert_eq!(
            SplitStrategy::Equal.shares(total, &[]).unwrap_err(),
            ValidationError::EmptySharers
        );
        assert_eq!(
            SplitStrategy::Equal.shares(total, &ids(&[1, 1])).unwrap_err(),
            ValidationError::DuplicateSharer(ParticipantId(1))
        );
    }

    #[test]
    fn test_exact_shares() {
        let split = SplitStrategy::Exact {
            shares: vec![
                ExactShare { participant: ParticipantId(2), minor: 70 },
                ExactShare { participant: ParticipantId(1), minor: 30 },
            ],
        };
        let shares = split
            .shares(Money::new(100, Currency::EUR), &ids(&[1, 2]))
            .unwrap();
        assert_eq!(minors(&shares), vec![30, 70]);
    }

    #[test]
    fn test_exact_shares_must_sum_to_total() {
        let split = SplitStrategy::Exact {
            shares: vec![
                ExactShare { participant: ParticipantId(1), minor: 30 },
                ExactShare { participant: ParticipantId(2), minor: 60 },
            ],
        };
        let err = split
            .shares(Money::new(100, Currency::EUR), &ids(&[1, 2]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::ShareMismatch {
                expected: 100,
                actual: 90
            }
        );
    }

    #[test]
    fn test_exact_shares_must_cover_every_sharer() {
        let split = SplitStrategy::Exact {
            shares: vec![
                ExactShare { participant: ParticipantId(1), minor: 50 },
                ExactShare { participant: ParticipantId(3), minor: 50 },
            ],
        };
        let err = split
            .shares(Money::new(100, Currency::EUR), &ids(&[1, 2]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSplit(_)));
    }

    #[test]
    fn test_percentage_split() {
        let split = SplitStrategy::Percentage {
            percentages: vec![pct(1, "50"), pct(2, "25"), pct(3, "25")],
        };
        let shares = split
            .shares(Money::new(1000, Currency::EUR), &ids(&[1, 2, 3]))
            .unwrap();
        assert_eq!(minors(&shares), vec![500, 250, 250]);
    }

    #[test]
    fn test_percentage_split_thirds_sum_exactly() {
        let split = SplitStrategy::Percentage {
            percentages: vec![pct(1, "33.33"), pct(2, "33.33"), pct(3, "33.34")],
        };
        let shares = split
            .shares(Money::new(100, Currency::EUR), &ids(&[1, 2, 3]))
            .unwrap();
        let sum: i64 = minors(&shares).iter().sum();
        assert_eq!(sum, 100);
    }

    #[test]
    fn test_percentage_within_one_minor_unit_is_accepted() {
        let split = SplitStrategy::Percentage {
            percentages: vec![pct(1, "33.33"), pct(2, "33.33"), pct(3, "33.33")],
        };
        let shares = split
            .shares(Money::new(100, Currency::EUR), &ids(&[1, 2, 3]))
            .unwrap();
        assert_eq!(minors(&shares), vec![34, 33, 33]);
    }

    #[test]
    fn test_percentage_mismatch() {
        let split = SplitStrategy::Percentage {
            percentages: vec![pct(1, "50"), pct(2, "40")],
        };
        let err = split
            .shares(Money::new(1000, Currency::EUR), &ids(&[1, 2]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::PercentageMismatch(_)));
    }

    #[test]
    fn test_percentage_at_decimal_limits_is_rejected() {
        let split = SplitStrategy::Percentage {
            percentages: vec![
                PercentShare {
                    participant: ParticipantId(1),
                    percent: Decimal::MAX,
                },
                PercentShare {
                    participant: ParticipantId(2),
                    percent: Decimal::MAX,
                },
            ],
        };
        let err = split
            .shares(Money::new(1000, Currency::EUR), &ids(&[1, 2]))
            .unwrap_err();
        assert_eq!(err, ValidationError::AmountOverflow);

        let split = SplitStrategy::Percentage {
            percentages: vec![PercentShare {
                participant: ParticipantId(1),
                percent: Decimal::MAX,
            }],
        };
        let err = split
            .shares(Money::new(i64::MAX, Currency::EUR), &ids(&[1]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::PercentageMismatch(_)));
    }

    #[test]
    fn test_split_serialization() {
        let json = serde_json::to_value(SplitStrategy::Equal).unwrap();
        assert_eq!(json, serde_json::json!({"type": "equal"}));

        let parsed: SplitStrategy = serde_json::from_value(serde_json::json!({
            "type": "exact",
            "shares": [{"participant": 1, "minor": 100}]
        }))
        .unwrap();
        assert_eq!(parsed.name(), "exact");
    }
}
