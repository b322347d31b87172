// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types: caller identities, batch ids, and ledger instance ids.
//!
//! All three are validated at construction, so holding one is proof that it is
//! well-formed. Serde goes through the same parsers (`try_from = "String"`), so
//! a value decoded off the wire or out of the ledger is held to the same rules
//! as one typed by an operator.

use std::fmt;
use std::str::FromStr;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::InvalidInput;

/// Byte length of an [`Identity`].
pub const IDENTITY_LEN: usize = 20;

/// Maximum byte length of a [`BatchId`].
pub const MAX_BATCH_ID_LEN: usize = 128;

/// A 20-byte account address identifying a caller or an owner.
///
/// Text form is `0x` followed by 40 hex digits. Parsing accepts either case and
/// an omitted prefix; `Display` always renders lowercase with the prefix. Two
/// identities are equal iff their bytes are equal, so `0xAB..` and `0xab..`
/// name the same account.
///
/// The all-zero address is the null identity. It parses, but it is never
/// accepted as an owner.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(pub [u8; IDENTITY_LEN]);

impl Identity {
    /// The null (all-zero) identity.
    pub const NULL: Self = Self([0u8; IDENTITY_LEN]);

    /// Parse an address from text. See the type docs for the accepted forms.
    pub fn parse(text: &str) -> Result<Self, InvalidInput> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.len() != IDENTITY_LEN * 2 {
            return Err(InvalidInput::MalformedIdentity(text.to_owned()));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| InvalidInput::MalformedIdentity(text.to_owned()))?;
        Ok(Self(bytes))
    }

    /// Returns `true` for the all-zero address.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }

    /// Returns `self` if it may hold a batch, rejecting the null identity.
    ///
    /// `role` names the parameter in the resulting error (`"creator"`,
    /// `"new_owner"`, ...).
    pub fn require_owner(self, role: &'static str) -> Result<Self, InvalidInput> {
        if self.is_null() {
            Err(InvalidInput::NullIdentity(role))
        } else {
            Ok(self)
        }
    }

    /// View the address as bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl FromStr for Identity {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

/// Externally chosen, registry-unique batch identifier.
///
/// Non-empty, at most [`MAX_BATCH_ID_LEN`] bytes, no surrounding whitespace and
/// no control characters. The id is what the UI encodes into a scannable code,
/// so it must survive a copy/paste round trip unchanged.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId(String);

impl BatchId {
    /// Validate and wrap a batch id.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidInput> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidInput::EmptyField("id"));
        }
        if id.len() > MAX_BATCH_ID_LEN {
            return Err(InvalidInput::FieldTooLong {
                field: "id",
                max: MAX_BATCH_ID_LEN,
                len: id.len(),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(InvalidInput::ControlCharacter("id"));
        }
        if id.trim() != id {
            return Err(InvalidInput::PaddedBatchId(id));
        }
        Ok(Self(id))
    }

    /// Borrow the id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({:?})", self.0)
    }
}

impl AsRef<str> for BatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BatchId {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BatchId {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchId> for String {
    fn from(value: BatchId) -> Self {
        value.0
    }
}

/// Fixed address of one registry instance (one ledger file).
///
/// Produced once when the instance is published; every later open of the
/// ledger and every boundary request names it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerInstanceId(pub [u8; 32]);

impl LedgerInstanceId {
    /// Parse the 64-hex-digit text form.
    pub fn parse(text: &str) -> Result<Self, InvalidInput> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| InvalidInput::MalformedInstanceId(text.to_owned()))?;
        Ok(Self(bytes))
    }

    /// View the id as bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for LedgerInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for LedgerInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerInstanceId({self})")
    }
}

impl FromStr for LedgerInstanceId {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LedgerInstanceId {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LedgerInstanceId> for String {
    fn from(value: LedgerInstanceId) -> Self {
        value.to_string()
    }
}

/// Produces a domain-separated instance id (prefix `b"ledger:"`) using BLAKE3.
///
/// `nonce` distinguishes two instances published under the same label.
pub fn make_instance_id(label: &str, nonce: &[u8]) -> LedgerInstanceId {
    let mut hasher = Hasher::new();
    hasher.update(b"ledger:");
    hasher.update(&(label.len() as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    hasher.update(nonce);
    LedgerInstanceId(hasher.finalize().into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identity_parse_is_case_and_prefix_insensitive() {
        let a = Identity::parse("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        let b = Identity::parse("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let c = Identity::parse("0XaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaA").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.to_string(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn identity_rejects_bad_length_and_digits() {
        assert!(matches!(
            Identity::parse("0xAAA"),
            Err(InvalidInput::MalformedIdentity(_))
        ));
        assert!(matches!(
            Identity::parse("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(InvalidInput::MalformedIdentity(_))
        ));
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn null_identity_cannot_own() {
        let null = Identity::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(null.is_null());
        assert_eq!(null, Identity::NULL);
        assert!(matches!(
            null.require_owner("new_owner"),
            Err(InvalidInput::NullIdentity("new_owner"))
        ));
        assert!(Identity([1; IDENTITY_LEN]).require_owner("creator").is_ok());
    }

    #[test]
    fn batch_id_validation() {
        assert!(BatchId::new("B1").is_ok());
        assert!(matches!(BatchId::new(""), Err(InvalidInput::EmptyField("id"))));
        assert!(matches!(
            BatchId::new(" B1"),
            Err(InvalidInput::PaddedBatchId(_))
        ));
        assert!(matches!(
            BatchId::new("B\n1"),
            Err(InvalidInput::ControlCharacter("id"))
        ));
        assert!(matches!(
            BatchId::new("x".repeat(MAX_BATCH_ID_LEN + 1)),
            Err(InvalidInput::FieldTooLong { field: "id", .. })
        ));
        assert!(BatchId::new("x".repeat(MAX_BATCH_ID_LEN)).is_ok());
    }

    #[test]
    fn instance_id_text_form_parses_back() {
        let id = make_instance_id("amoy", b"nonce");
        let parsed: LedgerInstanceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_ne!(id, make_instance_id("amoy", b"other"));
        assert!(LedgerInstanceId::parse("abc").is_err());
    }
}
