//! Tenant scoping mnemonic

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Longest mnemonic accepted. Keeps `{tenant}-{id}` close to the 64 character id limit.
pub const MAX_MNEMONIC_LEN: usize = 32;

/// Scoping mnemonic for one remote clinical-record connection.
///
/// Mnemonics are restricted to `[A-Za-z0-9.]` so that the `{mnemonic}-` prefix is
/// unambiguous inside a FHIR id (`[A-Za-z0-9\-.]{1,64}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tenant {
    mnemonic: Arc<str>,
}

impl Tenant {
    pub fn new(mnemonic: impl AsRef<str>) -> Result<Self> {
        let mnemonic = mnemonic.as_ref().trim();
        if mnemonic.is_empty() {
            return Err(ModelError::InvalidTenant {
                mnemonic: mnemonic.to_string(),
                reason: "mnemonic is empty",
            });
        }
        if mnemonic.len() > MAX_MNEMONIC_LEN {
            return Err(ModelError::InvalidTenant {
                mnemonic: mnemonic.to_string(),
                reason: "mnemonic is longer than 32 characters",
            });
        }
        if !mnemonic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
        {
            return Err(ModelError::InvalidTenant {
                mnemonic: mnemonic.to_string(),
                reason: "mnemonic may only contain ASCII letters, digits and '.'",
            });
        }
        Ok(Self {
            mnemonic: Arc::from(mnemonic),
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// The `"{mnemonic}-"` prefix applied to localized ids.
    pub fn prefix(&self) -> String {
        format!("{}-", self.mnemonic)
    }

    /// True when `id` already carries this tenant's prefix.
    pub fn owns(&self, id: &str) -> bool {
        id.strip_prefix(self.mnemonic.as_ref())
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)
    }
}

impl FromStr for Tenant {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tenant {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Tenant> for String {
    fn from(tenant: Tenant) -> Self {
        tenant.mnemonic.to_string()
    }
}
