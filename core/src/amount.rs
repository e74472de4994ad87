use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AmountError;
use crate::serde::drops_serde;

/// Drops in one XRP.
pub const DROPS_PER_XRP: u64 = 1_000_000;
/// Total XRP supply, in drops.
pub const MAX_DROPS: u64 = 100_000_000_000 * DROPS_PER_XRP;

/// An amount locked in escrow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Amount {
    /// Native XRP in drops, encoded as a decimal string.
    Drops(#[serde(with = "drops_serde")] u64),
    /// Trust-line token (token escrow).
    Issued {
        currency: String,
        issuer: String,
        value: String,
    },
    /// Multi-purpose token (token escrow).
    Mpt {
        mpt_issuance_id: String,
        value: String,
    },
}

impl Amount {
    /// Parses an XRP amount such as `"1.5"` into drops.
    pub fn xrp(xrp: &str) -> Result<Self, AmountError> {
        xrp_to_drops(xrp).map(Self::Drops)
    }

    /// Validate by enforcing non-zero, in-range amounts.
    pub fn validate(&self) -> Result<(), AmountError> {
        match self {
            Self::Drops(0) => Err(AmountError::Zero),
            Self::Drops(drops) if *drops > MAX_DROPS => {
                Err(AmountError::Overflow(drops.to_string()))
            }
            Self::Drops(_) => Ok(()),
            Self::Issued { value, .. } => match value.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => Ok(()),
                Ok(v) if v == 0.0 => Err(AmountError::Zero),
                _ => Err(AmountError::InvalidValue(value.clone())),
            },
            Self::Mpt { value, .. } => match value.parse::<u64>() {
                Ok(0) => Err(AmountError::Zero),
                Ok(_) => Ok(()),
                Err(_) => Err(AmountError::InvalidValue(value.clone())),
            },
        }
    }

    /// Drops, if this is a native amount.
    pub fn drops(&self) -> Option<u64> {
        match self {
            Self::Drops(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drops(d) => write!(f, "{} XRP", drops_to_xrp(*d)),
            Self::Issued {
                currency,
                issuer,
                value,
            } => write!(f, "{} {}@{}", value, currency, issuer),
            Self::Mpt {
                mpt_issuance_id,
                value,
            } => write!(f, "{} MPT({})", value, mpt_issuance_id),
        }
    }
}

/// Converts a decimal XRP string into drops.
///
/// ```
/// assert_eq!(xescrow_core::xrp_to_drops("1").unwrap(), 1_000_000);
/// assert_eq!(xescrow_core::xrp_to_drops("0.000001").unwrap(), 1);
/// ```
pub fn xrp_to_drops(xrp: &str) -> Result<u64, AmountError> {
    let xrp = xrp.trim();
    let (whole, frac) = xrp.split_once('.').unwrap_or((xrp, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::InvalidXrp(xrp.to_string()));
    }
    if frac.len() > 6 {
        return Err(AmountError::TooPrecise(xrp.to_string()));
    }

    let overflow = || AmountError::Overflow(xrp.to_string());
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<6}", frac).parse().map_err(|_| overflow())?
    };

    let drops = whole
        .checked_mul(DROPS_PER_XRP)
        .and_then(|d| d.checked_add(frac))
        .ok_or_else(overflow)?;
    if drops > MAX_DROPS {
        return Err(overflow());
    }
    Ok(drops)
}

/// Formats drops as a decimal XRP string without trailing zeros.
pub fn drops_to_xrp(drops: u64) -> String {
    let whole = drops / DROPS_PER_XRP;
    let frac = drops % DROPS_PER_XRP;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:06}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
