use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A percentage fee clamped to `[min_amount, max_amount]`. A zero bound means "no bound".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub name: Option<String>,
    pub percentage: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
}

impl FeeSchedule {
    pub fn proxypay_default() -> Self {
        Self {
            name: None,
            percentage: Decimal::new(5, 1),
            min_amount: Decimal::from(50),
            max_amount: Decimal::from(1000),
        }
    }

    pub fn none() -> Self {
        Self {
            name: None,
            percentage: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub amount: Decimal,
    pub applied_fee: Decimal,
    pub fee_amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub applied_min_amount: Option<Decimal>,
    pub applied_max_amount: Option<Decimal>,
}

pub fn calculate(amount: Decimal, schedule: &FeeSchedule) -> FeeBreakdown {
    let amount = money(amount);
    if schedule.percentage.is_zero() {
        return FeeBreakdown {
            name: schedule.name.clone(),
            amount,
            applied_fee: Decimal::ZERO,
            fee_amount: Decimal::ZERO,
            fee: Decimal::ZERO,
            net_amount: amount,
            applied_min_amount: None,
            applied_max_amount: None,
        };
    }

    let fee_amount = money(amount * schedule.percentage / Decimal::ONE_HUNDRED);
    let (fee, applied_min_amount, applied_max_amount) =
        if !schedule.min_amount.is_zero() && fee_amount < schedule.min_amount {
            (schedule.min_amount, Some(schedule.min_amount), None)
        } else if !schedule.max_amount.is_zero() && fee_amount > schedule.max_amount {
            (schedule.max_amount, None, Some(schedule.max_amount))
        } else {
            (fee_amount, None, None)
        };

    FeeBreakdown {
        name: schedule.name.clone(),
        amount,
        applied_fee: schedule.percentage,
        fee_amount,
        fee: money(fee),
        net_amount: money(amount - fee),
        applied_min_amount,
        applied_max_amount,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFees {
    pub proxypay_fee: FeeBreakdown,
    pub bank_fee: FeeBreakdown,
}

impl ReferenceFees {
    pub fn compute(amount: Decimal, gateway: &FeeSchedule, bank: &FeeSchedule) -> Self {
        Self {
            proxypay_fee: calculate(amount, gateway),
            bank_fee: calculate(amount, bank),
        }
    }

    pub fn fees_expense(&self) -> Decimal {
        self.proxypay_fee.fee + self.bank_fee.fee
    }

    pub fn net_amount(&self) -> Decimal {
        self.proxypay_fee.amount - self.fees_expense()
    }
}

fn money(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn small_amount_is_lifted_to_minimum() {
        let out = calculate(dec!(1000), &FeeSchedule::proxypay_default());
        assert_eq!(out.fee_amount, dec!(5.00));
        assert_eq!(out.fee, dec!(50));
        assert_eq!(out.net_amount, dec!(950));
        assert_eq!(out.applied_min_amount, Some(dec!(50)));
        assert_eq!(out.applied_max_amount, None);
    }

    #[test]
    fn large_amount_is_capped_at_maximum() {
        let out = calculate(dec!(1000000), &FeeSchedule::proxypay_default());
        assert_eq!(out.fee_amount, dec!(5000));
        assert_eq!(out.fee, dec!(1000));
        assert_eq!(out.applied_max_amount, Some(dec!(1000)));
    }

    #[test]
    fn zero_percentage_charges_nothing() {
        let out = calculate(dec!(2500.50), &FeeSchedule::none());
        assert_eq!(out.fee, Decimal::ZERO);
        assert_eq!(out.net_amount, dec!(2500.50));
    }

    #[test]
    fn zero_bounds_do_not_clamp() {
        let schedule = FeeSchedule {
            name: Some("BAI".to_string()),
            percentage: dec!(1),
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
        };
        let out = calculate(dec!(123.45), &schedule);
        assert_eq!(out.fee, dec!(1.23));
        assert_eq!(out.net_amount, dec!(122.22));
        assert_eq!(out.name.as_deref(), Some("BAI"));
    }

    #[test]
    fn reference_fees_sum_both_schedules() {
        let bank = FeeSchedule {
            name: None,
            percentage: dec!(1),
            min_amount: dec!(10),
            max_amount: Decimal::ZERO,
        };
        let fees = ReferenceFees::compute(dec!(20000), &FeeSchedule::proxypay_default(), &bank);
        assert_eq!(fees.proxypay_fee.fee, dec!(100));
        assert_eq!(fees.bank_fee.fee, dec!(200));
        assert_eq!(fees.fees_expense(), dec!(300));
        assert_eq!(fees.net_amount(), dec!(19700));
    }
}
