//! Access control for administrative commands.

use crate::account::AccountName;
use crate::error::AuthError;
use crate::traits::AccessControl;

/// Grants administrative rights to exactly one account, normally the
/// ledger's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleAuthority {
    authority: AccountName,
}

impl SingleAuthority {
    pub fn new(authority: AccountName) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &AccountName {
        &self.authority
    }
}

impl AccessControl for SingleAuthority {
    fn require_auth(&self, caller: &AccountName) -> Result<(), AuthError> {
        if caller == &self.authority {
            Ok(())
        } else {
            Err(AuthError::MissingAuthority {
                caller: caller.to_string(),
                required: self.authority.to_string(),
            })
        }
    }
}
