//! Typed asset amounts.
//!
//! [`Amount<K>`] pairs a minor-unit count with a zero-sized asset marker, so
//! adding an input-asset amount to an output-asset amount does not compile.
//! Untyped [`RawAsset`] values only exist at the notification boundary and
//! are narrowed with [`RawAsset::to_amount`].
//!
//! ```compile_fail
//! use diffraction_core::asset::{Amount, Athena, Eos};
//! let a: Amount<Eos> = Amount::new(1);
//! let b: Amount<Athena> = Amount::new(1);
//! let _ = a.checked_add(b);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{ASSET_PRECISION, MAX_ASSET_AMOUNT};
use crate::error::ValidationError;

/// Compile-time asset identity.
pub trait AssetKind:
    Copy + Clone + fmt::Debug + PartialEq + Eq + PartialOrd + Ord + std::hash::Hash + Default + Send + Sync + 'static
{
    /// Ticker code, upper case.
    const CODE: &'static str;
    /// Decimal places of the minor unit.
    const PRECISION: u8;

    /// Runtime symbol for this kind.
    fn symbol() -> Symbol {
        Symbol::new(Self::CODE, Self::PRECISION)
    }
}

/// The input asset deposits are made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Eos;

impl AssetKind for Eos {
    const CODE: &'static str = "EOS";
    const PRECISION: u8 = ASSET_PRECISION;
}

/// The output asset the ledger issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Athena;

impl AssetKind for Athena {
    const CODE: &'static str = "ATHENA";
    const PRECISION: u8 = ASSET_PRECISION;
}

/// A non-negative quantity of asset `K`, in minor units.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount<K: AssetKind> {
    units: u64,
    kind: PhantomData<K>,
}

impl<K: AssetKind> Amount<K> {
    pub const ZERO: Self = Self::new(0);

    pub const fn new(units: u64) -> Self {
        Self {
            units,
            kind: PhantomData,
        }
    }

    /// Minor-unit count.
    pub const fn units(&self) -> u64 {
        self.units
    }

    pub const fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.units.checked_add(rhs.units).map(Self::new)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.units.checked_sub(rhs.units).map(Self::new)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self::new(self.units.saturating_sub(rhs.units))
    }

    /// Widen back to an untyped on-chain asset.
    pub fn to_raw(&self) -> RawAsset {
        RawAsset {
            amount: self.units as i64,
            symbol: K::symbol(),
        }
    }
}

impl<K: AssetKind> fmt::Debug for Amount<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount<{}>({})", K::CODE, self.units)
    }
}

impl<K: AssetKind> fmt::Display for Amount<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_units(f, self.units as i128, K::PRECISION)?;
        write!(f, " {}", K::CODE)
    }
}

impl<K: AssetKind> Serialize for Amount<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.units)
    }
}

impl<'de, K: AssetKind> Deserialize<'de> for Amount<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::new)
    }
}

/// Runtime asset symbol: ticker code plus precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub code: String,
    pub precision: u8,
}

impl Symbol {
    pub fn new(code: impl Into<String>, precision: u8) -> Self {
        Self {
            code: code.into(),
            precision,
        }
    }

    /// Whether this symbol names asset kind `K`.
    pub fn is<K: AssetKind>(&self) -> bool {
        self.code == K::CODE && self.precision == K::PRECISION
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

/// An untyped on-chain asset, as carried by a transfer notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAsset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl RawAsset {
    /// Whether the amount lies within the representable asset range.
    pub fn is_valid(&self) -> bool {
        (-MAX_ASSET_AMOUNT..=MAX_ASSET_AMOUNT).contains(&self.amount)
            && !self.symbol.code.is_empty()
            && self.symbol.code.len() <= 7
            && self.symbol.code.bytes().all(|b| b.is_ascii_uppercase())
    }

    /// Narrow to a typed positive amount of asset `K`.
    ///
    /// Checks, in order: symbol, validity, positivity.
    pub fn to_amount<K: AssetKind>(&self) -> Result<Amount<K>, ValidationError> {
        if !self.symbol.is::<K>() {
            return Err(ValidationError::WrongAsset {
                expected: K::symbol().to_string(),
                got: self.symbol.to_string(),
            });
        }
        if !self.is_valid() {
            return Err(ValidationError::InvalidAmount(self.amount));
        }
        if self.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(Amount::new(self.amount as u64))
    }
}

impl fmt::Display for RawAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_units(f, self.amount as i128, self.symbol.precision)?;
        write!(f, " {}", self.symbol.code)
    }
}

/// Parses the `"1.0000 EOS"` form. The number of fractional digits sets the
/// precision, so `"1 EOS"` has precision 0 and will not match [`Eos`].
impl FromStr for RawAsset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedAsset(s.to_string());
        let (number, code) = s.trim().split_once(' ').ok_or_else(malformed)?;
        let code = code.trim();
        if code.is_empty() || code.len() > 7 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(malformed());
        }

        let (negative, number) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
            || frac.len() > 18
        {
            return Err(malformed());
        }

        let digits = format!("{whole}{frac}");
        let magnitude: i64 = digits.parse().map_err(|_| malformed())?;
        Ok(Self {
            amount: if negative { -magnitude } else { magnitude },
            symbol: Symbol::new(code, frac.len() as u8),
        })
    }
}

fn fmt_units(f: &mut fmt::Formatter<'_>, units: i128, precision: u8) -> fmt::Result {
    let sign = if units < 0 { "-" } else { "" };
    let units = units.unsigned_abs();
    if precision == 0 {
        return write!(f, "{sign}{units}");
    }
    let scale = 10u128.pow(precision as u32);
    write!(
        f,
        "{sign}{}.{:0width$}",
        units / scale,
        units % scale,
        width = precision as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eos(amount: i64) -> RawAsset {
        RawAsset {
            amount,
            symbol: Eos::symbol(),
        }
    }

    #[test]
    fn display_uses_precision() {
        assert_eq!(Amount::<Eos>::new(10_000).to_string(), "1.0000 EOS");
        assert_eq!(Amount::<Athena>::new(33_333).to_string(), "3.3333 ATHENA");
        assert_eq!(Amount::<Eos>::ZERO.to_string(), "0.0000 EOS");
    }

    #[test]
    fn symbol_display() {
        assert_eq!(Eos::symbol().to_string(), "4,EOS");
        assert_eq!(Athena::symbol().to_string(), "4,ATHENA");
    }

    #[test]
    fn parse_asset_string() {
        let asset: RawAsset = "12.3456 EOS".parse().unwrap();
        assert_eq!(asset, eos(123_456));
        assert_eq!(asset.to_string(), "12.3456 EOS");
    }

    #[test]
    fn parse_negative_asset() {
        let asset: RawAsset = "-0.0001 EOS".parse().unwrap();
        assert_eq!(asset.amount, -1);
        assert_eq!(asset.to_string(), "-0.0001 EOS");
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "EOS", "1.0000", "1.0000 eos", "1.x EOS", "1.0000 TOOLONGSYM", ". EOS"] {
            assert!(s.parse::<RawAsset>().is_err(), "{s:?} parsed");
        }
    }

    #[test]
    fn precision_follows_fraction_digits() {
        let asset: RawAsset = "1.00 EOS".parse().unwrap();
        assert_eq!(asset.symbol.precision, 2);
        assert!(matches!(
            asset.to_amount::<Eos>(),
            Err(ValidationError::WrongAsset { .. })
        ));
    }

    #[test]
    fn to_amount_accepts_positive_input_asset() {
        assert_eq!(eos(1).to_amount::<Eos>().unwrap(), Amount::new(1));
    }

    #[test]
    fn to_amount_rejects_other_asset() {
        let err = eos(1).to_amount::<Athena>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongAsset {
                expected: "4,ATHENA".into(),
                got: "4,EOS".into()
            }
        );
    }

    #[test]
    fn to_amount_rejects_zero_and_negative() {
        assert_eq!(eos(0).to_amount::<Eos>(), Err(ValidationError::NonPositiveAmount));
        assert_eq!(eos(-5).to_amount::<Eos>(), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn to_amount_rejects_out_of_range() {
        assert_eq!(
            eos(i64::MAX).to_amount::<Eos>(),
            Err(ValidationError::InvalidAmount(i64::MAX))
        );
        assert!(eos(MAX_ASSET_AMOUNT).to_amount::<Eos>().is_ok());
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::<Eos>::new(5);
        assert_eq!(a.checked_add(Amount::new(3)), Some(Amount::new(8)));
        assert_eq!(a.checked_sub(Amount::new(6)), None);
        assert_eq!(a.saturating_sub(Amount::new(6)), Amount::ZERO);
        assert_eq!(Amount::<Eos>::new(u64::MAX).checked_add(a), None);
    }

    #[test]
    fn amount_serializes_as_units() {
        let json = serde_json::to_string(&Amount::<Athena>::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: Amount<Athena> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.units(), 42);
    }

    #[test]
    fn to_raw_keeps_symbol() {
        let raw = Amount::<Athena>::new(7).to_raw();
        assert!(raw.symbol.is::<Athena>());
        assert_eq!(raw.amount, 7);
    }

    proptest! {
        #[test]
        fn display_parse_agree(units in 0i64..=MAX_ASSET_AMOUNT) {
            let text = eos(units).to_string();
            let parsed: RawAsset = text.parse().unwrap();
            prop_assert_eq!(parsed.amount, units);
            prop_assert!(parsed.symbol.is::<Eos>());
        }
    }
}
