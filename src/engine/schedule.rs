use crate::Amount;
use crate::model::{MonthlyEntry, Plan};

use super::ValidationError;

/// Rebuild `monthly_amount` from `monthly_data` when its length disagrees with the
/// plan duration. Returns `true` if the plan was changed.
///
/// Each month projects `payable_amount`, falling back to `installment_amount`, then zero.
/// A schedule that is itself short or padded never reaches `duration` entries, so the
/// cache is left alone once it already holds that projection.
pub fn heal_monthly_amount(plan: &mut Plan) -> bool {
    if plan.monthly_amount.len() == plan.duration as usize || plan.monthly_data.is_empty() {
        return false;
    }

    let rebuilt: Vec<Amount> = sorted_schedule(&plan.monthly_data)
        .into_iter()
        .map(|entry| {
            entry
                .payable_amount
                .or(entry.installment_amount)
                .unwrap_or(Amount::ZERO)
        })
        .collect();
    if rebuilt == plan.monthly_amount {
        return false;
    }
    plan.monthly_amount = rebuilt;
    true
}

/// The amount billed for `due_number`.
///
/// Reads the installment ("Due") column of the monthly schedule, or the cached
/// `monthly_amount` when the schedule has no value for that month.
pub fn due_amount(plan: &Plan, due_number: u32) -> Result<Amount, ValidationError> {
    let index = due_number.checked_sub(1).map(|i| i as usize);

    let from_schedule = index.and_then(|i| {
        sorted_schedule(&plan.monthly_data)
            .get(i)
            .and_then(|entry| entry.installment_amount)
    });
    let from_cache = index.and_then(|i| plan.monthly_amount.get(i).copied());

    from_schedule
        .or(from_cache)
        .ok_or(ValidationError::MissingSchedule {
            plan: plan.id,
            due_number,
        })
}

fn sorted_schedule(data: &[MonthlyEntry]) -> Vec<&MonthlyEntry> {
    let mut sorted: Vec<_> = data.iter().collect();
    sorted.sort_by_key(|entry| entry.month_number);
    sorted
}
