//! Role-mask authorization
//!
//! Each role in the role table owns one bit; a role id is the mask with that
//! bit set. An operation accepts a list of role ids, and a caller passes when
//! its mask shares a bit with the union of the accepted ids, counting only
//! as many low bits as there are roles loaded.

use std::sync::Arc;

use tracing::{debug, error};

use crate::store::CredentialStore;
use crate::{Error, Result};

/// Widest role table the gate accepts; role ids are `i64` and the sign bit
/// is never used.
pub const MAX_ROLES: usize = 63;

/// Non-negative role id interpreted as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMask(u64);

impl RoleMask {
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Keep only the low `width` bits
    pub fn truncate(self, width: usize) -> Self {
        if width >= 64 {
            self
        } else {
            Self(self.0 & ((1u64 << width) - 1))
        }
    }

    pub fn intersects(&self, other: RoleMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of the accepted role ids
    pub fn union_of(role_ids: &[i64]) -> Result<Self> {
        let mut union = 0u64;
        for id in role_ids {
            union |= RoleMask::try_from(*id)?.0;
        }
        Ok(RoleMask(union))
    }
}

impl TryFrom<i64> for RoleMask {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        u64::try_from(value)
            .map(RoleMask)
            .map_err(|_| Error::InvalidRole(value.to_string()))
    }
}

/// Pure decision: allow iff the caller shares a bit with the accepted roles
/// within `width` bits.
pub fn decide(caller_role_id: i64, accepted_role_ids: &[i64], width: usize) -> Result<bool> {
    let caller = RoleMask::try_from(caller_role_id)?.truncate(width);
    let allowed = RoleMask::union_of(accepted_role_ids)?.truncate(width);
    Ok(caller.intersects(allowed))
}

/// Request-time authorization against the stored role table.
///
/// The role table is read on every check; there is no cache to invalidate.
#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<dyn CredentialStore>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// `Ok(())` when allowed, [`Error::PermissionDenied`] otherwise.
    ///
    /// A negative role value is [`Error::InvalidRole`]; a failing or
    /// oversized role table is an infrastructure error.
    pub async fn authorize(&self, caller_role_id: i64, accepted_role_ids: &[i64]) -> Result<()> {
        // Reject bad input before touching the store.
        RoleMask::try_from(caller_role_id)?;

        let roles = self.store.list_roles().await.map_err(|e| {
            error!("failed to load role table: {}", e);
            e
        })?;
        if roles.len() > MAX_ROLES {
            return Err(Error::RoleSetTooLarge(roles.len()));
        }

        if decide(caller_role_id, accepted_role_ids, roles.len())? {
            Ok(())
        } else {
            debug!(caller_role_id, "authorization denied");
            Err(Error::PermissionDenied)
        }
    }
}
