//! PREIMAGE-SHA-256 crypto-conditions in the binary layout the ledger expects.
//!
//! ```text
//! condition   = A0 25 80 20 || SHA-256(preimage) || 81 01 20   (39 bytes)
//! fulfillment = A0 22 80 20 || preimage                        (36 bytes)
//! ```

use std::fmt;
use std::str::FromStr;

use rand_core::{OsRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{ConditionError, EscrowError};
use crate::Result;

/// Length of the secret preimage in bytes.
pub const PREIMAGE_LEN: usize = 32;
/// Length of an encoded condition in bytes.
pub const CONDITION_LEN: usize = 39;
/// Length of an encoded fulfillment in bytes.
pub const FULFILLMENT_LEN: usize = 36;

/// Type tag, content length and fingerprint tag.
const CONDITION_PREFIX: [u8; 4] = [0xA0, 0x25, 0x80, 0x20];
/// Cost tag; the cost of a preimage condition is its length (32).
const CONDITION_SUFFIX: [u8; 3] = [0x81, 0x01, 0x20];
/// Type tag, content length and preimage tag.
const FULFILLMENT_PREFIX: [u8; 4] = [0xA0, 0x22, 0x80, 0x20];

/// Generates a fresh condition/fulfillment pair from the OS random source.
///
/// # Errors
///
/// Returns [`EscrowError::RandomSourceExhausted`] if the random source fails.
///
/// # Example
///
/// ```
/// let pair = xescrow_core::generate().unwrap();
/// assert_eq!(pair.condition_hex().len(), 78);
/// assert_eq!(pair.fulfillment_hex().len(), 72);
/// assert!(pair.fulfillment.verify(&pair.condition).is_ok());
/// ```
pub fn generate() -> Result<ConditionPair> {
    let preimage = Preimage::random()?;
    Ok(ConditionPair::from_preimage(preimage))
}

/// Secret 32-byte value whose hash is committed to by a [`Condition`].
#[derive(Clone, PartialEq, Eq)]
pub struct Preimage([u8; PREIMAGE_LEN]);

impl Preimage {
    /// Draws 32 bytes from the OS random source.
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; PREIMAGE_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| EscrowError::RandomSourceExhausted(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; PREIMAGE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PREIMAGE_LEN] {
        &self.0
    }

    /// SHA-256 of the preimage.
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.0).into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(..)")
    }
}

/// Public commitment gating an escrow: the SHA-256 fingerprint of a preimage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    fingerprint: [u8; 32],
}

impl Condition {
    pub fn from_fingerprint(fingerprint: [u8; 32]) -> Self {
        Self { fingerprint }
    }

    /// The SHA-256 hash embedded in the condition.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn to_bytes(&self) -> [u8; CONDITION_LEN] {
        let mut out = [0u8; CONDITION_LEN];
        out[..4].copy_from_slice(&CONDITION_PREFIX);
        out[4..36].copy_from_slice(&self.fingerprint);
        out[36..].copy_from_slice(&CONDITION_SUFFIX);
        out
    }

    /// Decodes a binary condition, rejecting any other type or cost.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, ConditionError> {
        if bytes.len() != CONDITION_LEN {
            return Err(ConditionError::Length {
                kind: "condition",
                expected: CONDITION_LEN,
                found: bytes.len(),
            });
        }
        if bytes[..4] != CONDITION_PREFIX || bytes[36..] != CONDITION_SUFFIX {
            return Err(ConditionError::Encoding("condition"));
        }
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&bytes[4..36]);
        Ok(Self { fingerprint })
    }

    /// Uppercase hex, as submitted in `EscrowCreate.Condition`.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, ConditionError> {
        Self::from_bytes(&hex::decode(s)?)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({})", self.to_hex())
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Secret-revealing value that satisfies a [`Condition`].
///
/// Keep private until the escrow is finished: submitting it is what
/// discloses the preimage.
#[derive(Clone, PartialEq, Eq)]
pub struct Fulfillment {
    preimage: Preimage,
}

impl Fulfillment {
    pub fn from_preimage(preimage: Preimage) -> Self {
        Self { preimage }
    }

    /// The preimage embedded verbatim in the fulfillment.
    pub fn preimage(&self) -> &Preimage {
        &self.preimage
    }

    /// Re-derives the condition this fulfillment satisfies.
    pub fn condition(&self) -> Condition {
        Condition::from_fingerprint(self.preimage.digest())
    }

    /// Verifies that `SHA-256(preimage)` equals the condition's fingerprint
    /// using constant-time comparison.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::PreimageMismatch`] if the hashes differ.
    pub fn verify(&self, condition: &Condition) -> std::result::Result<(), ConditionError> {
        let computed = self.preimage.digest();
        computed
            .as_slice()
            .ct_eq(condition.fingerprint().as_slice())
            .unwrap_u8()
            .eq(&1)
            .then_some(())
            .ok_or(ConditionError::PreimageMismatch)
    }

    pub fn to_bytes(&self) -> [u8; FULFILLMENT_LEN] {
        let mut out = [0u8; FULFILLMENT_LEN];
        out[..4].copy_from_slice(&FULFILLMENT_PREFIX);
        out[4..].copy_from_slice(self.preimage.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, ConditionError> {
        if bytes.len() != FULFILLMENT_LEN {
            return Err(ConditionError::Length {
                kind: "fulfillment",
                expected: FULFILLMENT_LEN,
                found: bytes.len(),
            });
        }
        if bytes[..4] != FULFILLMENT_PREFIX {
            return Err(ConditionError::Encoding("fulfillment"));
        }
        let mut preimage = [0u8; PREIMAGE_LEN];
        preimage.copy_from_slice(&bytes[4..]);
        Ok(Self::from_preimage(Preimage(preimage)))
    }

    /// Uppercase hex, as submitted in `EscrowFinish.Fulfillment`.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, ConditionError> {
        Self::from_bytes(&hex::decode(s)?)
    }
}

impl fmt::Debug for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fulfillment(..)")
    }
}

impl FromStr for Fulfillment {
    type Err = ConditionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Fulfillment {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fulfillment {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// A condition together with the fulfillment that satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionPair {
    /// Published on the ledger when the escrow is created.
    pub condition: Condition,
    /// Revealed when the escrow is finished.
    pub fulfillment: Fulfillment,
}

impl ConditionPair {
    /// Deterministically derives both values from `preimage`.
    pub fn from_preimage(preimage: Preimage) -> Self {
        let fulfillment = Fulfillment::from_preimage(preimage);
        Self {
            condition: fulfillment.condition(),
            fulfillment,
        }
    }

    pub fn condition_hex(&self) -> String {
        self.condition.to_hex()
    }

    pub fn fulfillment_hex(&self) -> String {
        self.fulfillment.to_hex()
    }

    pub fn preimage_hex(&self) -> String {
        self.fulfillment.preimage().to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of 32 zero bytes.
    const ZERO_DIGEST: &str = "66687AADF862BD776C8FC18B8E9F8E20089714856EE233B3902A591D0D5F2925";

    #[test]
    fn zero_preimage_vector() {
        let pair = ConditionPair::from_preimage(Preimage::from_bytes([0u8; 32]));
        assert_eq!(
            pair.condition_hex(),
            format!("A0258020{ZERO_DIGEST}810120")
        );
        assert_eq!(
            pair.fulfillment_hex(),
            format!("A0228020{}", "00".repeat(32))
        );
        assert_eq!(pair.preimage_hex(), "00".repeat(32));
    }

    #[test]
    fn generated_pair_is_consistent() {
        let pair = generate().unwrap();
        assert_eq!(pair.condition.to_bytes().len(), CONDITION_LEN);
        assert_eq!(pair.fulfillment.to_bytes().len(), FULFILLMENT_LEN);

        let preimage = pair.fulfillment.preimage();
        let expected: [u8; 32] = Sha256::digest(preimage.as_bytes()).into();
        assert_eq!(pair.condition.fingerprint(), &expected);
        assert!(pair.fulfillment.verify(&pair.condition).is_ok());
    }

    #[test]
    fn independent_preimages() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a.preimage_hex(), b.preimage_hex());
        assert_ne!(a.condition, b.condition);
    }

    #[test]
    fn mismatched_fulfillment() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_eq!(
            b.fulfillment.verify(&a.condition),
            Err(ConditionError::PreimageMismatch)
        );
    }

    #[test]
    fn decode_hex() {
        let pair = generate().unwrap();
        let cond = Condition::from_hex(&pair.condition_hex()).unwrap();
        assert_eq!(cond, pair.condition);
        let ful: Fulfillment = pair.fulfillment_hex().to_lowercase().parse().unwrap();
        assert_eq!(ful, pair.fulfillment);
    }

    #[test]
    fn reject_malformed() {
        assert!(matches!(
            Condition::from_hex("zz"),
            Err(ConditionError::Hex(_))
        ));
        assert_eq!(
            Condition::from_bytes(&[0xA0; 38]),
            Err(ConditionError::Length {
                kind: "condition",
                expected: CONDITION_LEN,
                found: 38
            })
        );

        // cost byte of a 64-byte preimage
        let mut bytes = generate().unwrap().condition.to_bytes();
        bytes[38] = 0x40;
        assert_eq!(
            Condition::from_bytes(&bytes),
            Err(ConditionError::Encoding("condition"))
        );

        let mut bytes = generate().unwrap().fulfillment.to_bytes();
        bytes[1] = 0x23;
        assert_eq!(
            Fulfillment::from_bytes(&bytes),
            Err(ConditionError::Encoding("fulfillment"))
        );
    }

    #[test]
    fn secrets_are_redacted() {
        let pair = generate().unwrap();
        let debug = format!("{:?}", pair);
        assert!(!debug.contains(&pair.fulfillment_hex()));
        assert!(debug.contains(&pair.condition_hex()));
    }

    #[test]
    fn serde_as_hex() {
        let pair = ConditionPair::from_preimage(Preimage::from_bytes([7u8; 32]));
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["condition"], pair.condition_hex());
        assert_eq!(json["fulfillment"], pair.fulfillment_hex());
        let back: ConditionPair = serde_json::from_value(json).unwrap();
        assert_eq!(back, pair);
    }
}
