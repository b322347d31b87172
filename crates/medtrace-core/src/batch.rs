// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The batch record.

use serde::{Deserialize, Serialize};

use crate::error::InvalidInput;
use crate::ident::{BatchId, Identity};

/// Maximum byte length of `name` and `manufacturer`.
pub const MAX_TEXT_LEN: usize = 256;

/// Provenance record for one pharmaceutical lot.
///
/// `id`, `name` and `manufacturer` are fixed at creation. Only the store can
/// produce a copy with a different owner, and only through a committed
/// transfer. Decoding runs the same validation as [`Batch::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatch")]
pub struct Batch {
    id: BatchId,
    name: String,
    manufacturer: String,
    owner: Identity,
}

impl Batch {
    /// Build a validated record. `owner` must not be the null identity.
    pub fn new(
        id: BatchId,
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        owner: Identity,
    ) -> Result<Self, InvalidInput> {
        let name = name.into();
        let manufacturer = manufacturer.into();
        validate_text("name", &name)?;
        validate_text("manufacturer", &manufacturer)?;
        let owner = owner.require_owner("owner")?;
        Ok(Self {
            id,
            name,
            manufacturer,
            owner,
        })
    }

    /// Batch identifier.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// Descriptive medicine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manufacturer of record.
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Current custodian.
    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Split into the `(id, name, manufacturer, owner)` tuple.
    pub fn into_parts(self) -> (BatchId, String, String, Identity) {
        (self.id, self.name, self.manufacturer, self.owner)
    }

    pub(crate) fn set_owner(&mut self, owner: Identity) {
        self.owner = owner;
    }
}

fn validate_text(field: &'static str, value: &str) -> Result<(), InvalidInput> {
    if value.trim().is_empty() {
        return Err(InvalidInput::EmptyField(field));
    }
    if value.len() > MAX_TEXT_LEN {
        return Err(InvalidInput::FieldTooLong {
            field,
            max: MAX_TEXT_LEN,
            len: value.len(),
        });
    }
    if value.chars().any(char::is_control) {
        return Err(InvalidInput::ControlCharacter(field));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawBatch {
    id: BatchId,
    name: String,
    manufacturer: String,
    owner: Identity,
}

impl TryFrom<RawBatch> for Batch {
    type Error = InvalidInput;

    fn try_from(raw: RawBatch) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.name, raw.manufacturer, raw.owner)
    }
}
