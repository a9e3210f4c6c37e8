use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::domain::{Currency, Debt, Money, ParticipantId};

use super::LedgerError;

/// Turns net balances into the transfers that clear them.
///
/// Greedy: the largest debtor always pays the largest creditor as much as one
/// of them needs, so every transfer retires at least one participant and N
/// participants need at most N-1 transfers. Equal balances are taken in
/// ascending participant id order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    pub fn settle(
        &self,
        balances: &BTreeMap<ParticipantId, Money>,
        currency: Currency,
    ) -> Result<Vec<Debt>, LedgerError> {
        // (amount, Reverse(id)): biggest amount first, then smallest id.
        let mut debtors: BinaryHeap<(i64, Reverse<ParticipantId>)> = BinaryHeap::new();
        let mut creditors: BinaryHeap<(i64, Reverse<ParticipantId>)> = BinaryHeap::new();
        let mut sum: i128 = 0;

        for (participant, balance) in balances {
            balance.ensure_currency(currency)?;
            sum += balance.minor() as i128;
            if balance.is_negative() {
                let owed = balance
                    .minor()
                    .checked_neg()
                    .ok_or(crate::domain::ValidationError::AmountOverflow)?;
                debtors.push((owed, Reverse(*participant)));
            } else if balance.is_positive() {
                creditors.push((balance.minor(), Reverse(*participant)));
            }
        }

        if sum != 0 {
            tracing::error!(sum = %sum, "refusing to settle unbalanced balances");
            return Err(LedgerError::Unbalanced(format!(
                "balances sum to {} minor units",
                sum
            )));
        }

        let mut debts = Vec::with_capacity(balances.len().saturating_sub(1));
        while let (Some(&(owed, Reverse(debtor))), Some(&(credit, Reverse(lender)))) =
            (debtors.peek(), creditors.peek())
        {
            debtors.pop();
            creditors.pop();

            let amount = owed.min(credit);
            let money = Money::new(amount, currency);
            debts.push(Debt::new(
                debtor,
                lender,
                money,
                false,
                format!("participant {} pays participant {} {}", debtor, lender, money),
            )?);

            if owed > amount {
                debtors.push((owed - amount, Reverse(debtor)));
            }
            if credit > amount {
                creditors.push((credit - amount, Reverse(lender)));
            }
        }

        tracing::debug!(
            participants = balances.len(),
            transfers = debts.len(),
            "settlement computed"
        );
        Ok(debts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur(minor: i64) -> Money {
        Money::new(minor, Currency::EUR)
    }

    fn balances(raw: &[(i64, i64)]) -> BTreeMap<ParticipantId, Money> {
        raw.iter()
            .map(|(id, minor)| (ParticipantId(*id), eur(*minor)))
            .collect()
    }

    fn triples(debts: &[Debt]) -> Vec<(i64, i64, i64)> {
        debts
            .iter()
            .map(|d| (d.debtor().0, d.lender().0, d.amount().minor()))
            .collect()
    }

    #[test]
    fn test_one_creditor_two_debtors() {
        let debts = SettlementEngine
            .settle(&balances(&[(1, 2000), (2, -1000), (3, -1000)]), Currency::EUR)
            .unwrap();
        assert_eq!(triples(&debts), vec![(2, 1, 1000), (3, 1, 1000)]);
        assert!(debts.iter().all(|d| !d.is_collective()));
    }

    #[test]
    fn test_largest_debtor_pays_largest_creditor_first() {
        let debts = SettlementEngine
            .settle(
                &balances(&[(1, 500), (2, 1500), (3, -1800), (4, -200)]),
                Currency::EUR,
            )
            .unwrap();
        assert_eq!(
            triples(&debts),
            vec![(3, 2, 1500), (3, 1, 300), (4, 1, 200)]
        );
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let debts = SettlementEngine
            .settle(
                &balances(&[(4, 100), (2, 100), (3, -100), (1, -100)]),
                Currency::EUR,
            )
            .unwrap();
        assert_eq!(triples(&debts), vec![(1, 2, 100), (3, 4, 100)]);
    }

    #[test]
    fn test_all_zero_needs_no_transfers() {
        let debts = SettlementEngine
            .settle(&balances(&[(1, 0), (2, 0)]), Currency::EUR)
            .unwrap();
        assert!(debts.is_empty());
        assert!(SettlementEngine
            .settle(&BTreeMap::new(), Currency::EUR)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        let err = SettlementEngine
            .settle(&balances(&[(1, 100), (2, -99)]), Currency::EUR)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unbalanced(_)));
        assert!(err.is_consistency());
    }

    #[test]
    fn test_currency_mismatch_is_rejected() {
        let err = SettlementEngine
            .settle(&balances(&[(1, 100), (2, -100)]), Currency::USD)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
