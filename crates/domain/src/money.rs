//! Money, currency and real/bonus balance value objects.

use serde::{Deserialize, Serialize};

/// Money amount in minor currency units (e.g. 1000 = 10.00 EUR).
///
/// Aggregators exchange integer minor units, so no floating point is involved
/// anywhere between the callback and the wallet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two amounts.
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Clamps negative amounts to zero.
    pub fn non_negative(self) -> Money {
        Money(self.0.max(0))
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts `other`, returning `None` on overflow.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency code, normalised to upper case.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// How an amount is divided between the real and bonus wallet buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Split {
    pub real: Money,
    pub bonus: Money,
}

impl Split {
    pub fn new(real: Money, bonus: Money) -> Self {
        Self { real, bonus }
    }

    /// Attributes the whole amount to the real bucket.
    pub fn real_only(amount: Money) -> Self {
        Self {
            real: amount,
            bonus: Money::zero(),
        }
    }

    /// A split that moves no money at all.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Money {
        self.real + self.bonus
    }

    pub fn is_zero(&self) -> bool {
        self.real.is_zero() && self.bonus.is_zero()
    }
}

/// A player's wallet balance, split into real and bonus funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub real: Money,
    pub bonus: Money,
}

impl Balance {
    pub fn new(real: Money, bonus: Money) -> Self {
        Self { real, bonus }
    }

    pub fn total(&self) -> Money {
        self.real + self.bonus
    }

    /// Returns true if both buckets can cover their part of the split.
    pub fn covers(&self, split: &Split) -> bool {
        self.real >= split.real && self.bonus >= split.bonus
    }

    /// Returns the balance after debiting the split.
    pub fn debit(&self, split: &Split) -> Balance {
        Balance {
            real: self.real - split.real,
            bonus: self.bonus - split.bonus,
        }
    }

    /// Returns the balance after crediting the split.
    pub fn credit(&self, split: &Split) -> Balance {
        Balance {
            real: self.real + split.real,
            bonus: self.bonus + split.bonus,
        }
    }

    /// Like [`Balance::debit`], but `None` if a bucket or the total would
    /// leave the `i64` range.
    pub fn checked_debit(&self, split: &Split) -> Option<Balance> {
        Balance {
            real: self.real.checked_sub(split.real)?,
            bonus: self.bonus.checked_sub(split.bonus)?,
        }
        .bounded()
    }

    /// Like [`Balance::credit`], but `None` if a bucket or the total would
    /// leave the `i64` range.
    pub fn checked_credit(&self, split: &Split) -> Option<Balance> {
        Balance {
            real: self.real.checked_add(split.real)?,
            bonus: self.bonus.checked_add(split.bonus)?,
        }
        .bounded()
    }

    fn bounded(self) -> Option<Balance> {
        self.real.checked_add(self.bonus).map(|_| self)
    }
}
