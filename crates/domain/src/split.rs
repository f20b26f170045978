//! Real/bonus split policy.
//!
//! Bets draw real funds first and fall back to bonus funds. Wins and refunds
//! go back to the buckets the matching bet drew from, in the same proportion.
//! Games with bonus bets disabled book everything against real funds.

use crate::money::{Balance, Money, Split};

/// Decides how a bet of `amount` is drawn from `balance`.
///
/// The result may exceed the available funds; callers check
/// [`Balance::covers`] before withdrawing.
pub fn withdrawal_split(amount: Money, balance: &Balance, bonus_bet_enabled: bool) -> Split {
    if !bonus_bet_enabled {
        return Split::real_only(amount);
    }
    let real = amount.min(balance.real.non_negative());
    Split::new(real, amount - real)
}

/// Splits `amount` in the same real:bonus proportion as `reference`.
///
/// The bonus part is rounded down so rounding always favours the real bucket.
pub fn proportional_split(amount: Money, reference: &Split, bonus_bet_enabled: bool) -> Split {
    let reference_total = reference.total().minor();
    if !bonus_bet_enabled || reference_total <= 0 || reference.bonus.minor() <= 0 {
        return Split::real_only(amount);
    }
    let bonus =
        (amount.minor() as i128 * reference.bonus.minor() as i128 / reference_total as i128) as i64;
    let bonus = Money::from_minor(bonus);
    Split::new(amount - bonus, bonus)
}
