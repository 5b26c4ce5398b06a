//! Take-profit level allocation.
//!
//! Splits a filled position across its take-profit targets. Percentages for
//! all but the last level are floor-rounded; the last level absorbs the
//! remainder so percentages sum to exactly 100 and share quantities sum to
//! exactly the filled quantity. Share quantities are floor-rounded to 4
//! decimal places per level, matching the store's DECIMAL(10, 4) columns.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::signal::TargetSpec;

const SHARE_DECIMALS: u32 = 4;
const PERCENT_DECIMALS: u32 = 2;

/// One materialized take-profit level, ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelAllocation {
    pub level_number: i32,
    pub price: Decimal,
    pub percentage: Decimal,
    pub shares: Decimal,
}

/// Allocates `filled_quantity` across the given targets.
///
/// Explicit per-target percentages are honored when present; targets without
/// one share the percentage left over, split equally. In every case the final
/// level absorbs rounding remainders, in both percent and shares. Levels
/// whose share quantity floors to zero are dropped; they could never
/// execute.
#[must_use]
pub fn allocate_levels(targets: &[TargetSpec], filled_quantity: Decimal) -> Vec<LevelAllocation> {
    if targets.is_empty() || filled_quantity <= Decimal::ZERO {
        return Vec::new();
    }

    let hundred = Decimal::ONE_HUNDRED;
    let count = targets.len();

    // Resolve percentages: explicit values first, equal split of the rest.
    let explicit_total: Decimal = targets.iter().filter_map(|t| t.percentage).sum();
    let unspecified = targets.iter().filter(|t| t.percentage.is_none()).count();

    let equal_share = if unspecified > 0 {
        let remaining = (hundred - explicit_total).max(Decimal::ZERO);
        (remaining / Decimal::from(unspecified))
            .round_dp_with_strategy(PERCENT_DECIMALS, RoundingStrategy::ToZero)
    } else {
        Decimal::ZERO
    };

    let mut percentages: Vec<Decimal> = targets
        .iter()
        .map(|t| t.percentage.unwrap_or(equal_share))
        .collect();

    // Last level absorbs the percent remainder so the column sums to 100.
    let leading: Decimal = percentages[..count - 1].iter().copied().sum();
    percentages[count - 1] = hundred - leading;

    let mut levels = Vec::with_capacity(count);
    let mut allocated = Decimal::ZERO;

    for (idx, (target, pct)) in targets.iter().zip(&percentages).enumerate() {
        let shares = if idx == count - 1 {
            // Remainder, never re-derived from the percentage.
            filled_quantity - allocated
        } else {
            (filled_quantity * *pct / hundred)
                .round_dp_with_strategy(SHARE_DECIMALS, RoundingStrategy::ToZero)
        };
        allocated += shares;

        levels.push(LevelAllocation {
            level_number: i32::try_from(idx).unwrap_or(i32::MAX - 1) + 1,
            price: target.price,
            percentage: *pct,
            shares,
        });
    }

    levels.retain(|level| level.shares > Decimal::ZERO);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn targets(prices: &[Decimal]) -> Vec<TargetSpec> {
        prices
            .iter()
            .map(|&price| TargetSpec { price, percentage: None })
            .collect()
    }

    fn share_sum(levels: &[LevelAllocation]) -> Decimal {
        levels.iter().map(|l| l.shares).sum()
    }

    #[test]
    fn equal_split_sums_to_filled_quantity() {
        let levels = allocate_levels(&targets(&[dec!(11), dec!(12)]), dec!(100));

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].shares, dec!(50));
        assert_eq!(levels[1].shares, dec!(50));
        assert_eq!(levels[0].percentage + levels[1].percentage, dec!(100));
    }

    #[test]
    fn last_level_absorbs_rounding_remainder() {
        // 100 / 3 does not divide evenly in either percent or shares.
        let levels = allocate_levels(&targets(&[dec!(11), dec!(12), dec!(13)]), dec!(10));

        assert_eq!(levels.len(), 3);
        let total: Decimal = levels.iter().map(|l| l.percentage).sum();
        assert_eq!(total, dec!(100));
        assert_eq!(share_sum(&levels), dec!(10));
        // First two are floored, last is strictly the remainder.
        assert_eq!(levels[0].shares, dec!(3.3330));
        assert_eq!(levels[1].shares, dec!(3.3330));
        assert_eq!(levels[2].shares, dec!(3.3340));
    }

    #[test]
    fn share_sum_within_tolerance_for_fractional_positions() {
        let filled = dec!(7.1359);
        let levels = allocate_levels(&targets(&[dec!(5), dec!(6), dec!(7), dec!(8)]), filled);

        let diff = (share_sum(&levels) - filled).abs();
        assert!(diff <= dec!(0.0001), "diff was {diff}");
    }

    #[test]
    fn explicit_percentages_are_honored() {
        let specs = vec![
            TargetSpec { price: dec!(11), percentage: Some(dec!(30)) },
            TargetSpec { price: dec!(12), percentage: Some(dec!(70)) },
        ];
        let levels = allocate_levels(&specs, dec!(200));

        assert_eq!(levels[0].shares, dec!(60));
        assert_eq!(levels[1].shares, dec!(140));
    }

    #[test]
    fn mixed_explicit_and_default_percentages() {
        let specs = vec![
            TargetSpec { price: dec!(11), percentage: Some(dec!(50)) },
            TargetSpec { price: dec!(12), percentage: None },
            TargetSpec { price: dec!(13), percentage: None },
        ];
        let levels = allocate_levels(&specs, dec!(100));

        assert_eq!(levels[0].percentage, dec!(50));
        assert_eq!(levels[1].percentage, dec!(25));
        assert_eq!(levels[2].percentage, dec!(25));
        assert_eq!(share_sum(&levels), dec!(100));
    }

    #[test]
    fn zero_share_levels_are_dropped() {
        // 0.0001 shares across three levels: only the remainder level survives.
        let levels = allocate_levels(&targets(&[dec!(11), dec!(12), dec!(13)]), dec!(0.0001));

        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].level_number, 3);
        assert_eq!(levels[0].shares, dec!(0.0001));
    }

    #[test]
    fn level_numbers_are_one_based_ordinals() {
        let levels = allocate_levels(&targets(&[dec!(11), dec!(12), dec!(13)]), dec!(30));
        let numbers: Vec<i32> = levels.iter().map(|l| l.level_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn empty_targets_yield_no_levels() {
        assert!(allocate_levels(&[], dec!(100)).is_empty());
        assert!(allocate_levels(&targets(&[dec!(11)]), Decimal::ZERO).is_empty());
    }
}
