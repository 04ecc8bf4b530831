//! Caller identity and permission checks.
//!
//! Each operation declares a [`Requirement`]; [`authorize`] is the single gate
//! that evaluates it against the [`Caller`] before any work is done.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use libris_kernel::settings::AuthSettings;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Named capabilities a caller may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    CanMarkReturned,
    CanSeeBorrowed,
    CanManageAuthors,
    CanManageBooks,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::CanMarkReturned,
        Permission::CanSeeBorrowed,
        Permission::CanManageAuthors,
        Permission::CanManageBooks,
    ];

    pub fn codename(&self) -> &'static str {
        match self {
            Permission::CanMarkReturned => "catalog.can_mark_returned",
            Permission::CanSeeBorrowed => "catalog.can_see_borrowed",
            Permission::CanManageAuthors => "catalog.can_manage_authors",
            Permission::CanManageBooks => "catalog.can_manage_books",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.codename() == value)
            .ok_or_else(|| AuthzError::UnknownPermission(value.to_string()))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.codename())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("user '{username}' lacks permission '{permission}'")]
    MissingPermission {
        username: String,
        permission: Permission,
    },

    #[error("unknown permission '{0}'")]
    UnknownPermission(String),

    #[error("token for user '{0}' is already assigned to another user")]
    DuplicateToken(String),
}

/// An authenticated account and its granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    pub fn new(
        username: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            username: username.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Whoever issued the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    User(Principal),
}

impl Caller {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::User(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::User(principal) => Some(principal),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.principal()
            .is_some_and(|principal| principal.has_permission(permission))
    }
}

/// What an operation demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    login: bool,
    permissions: &'static [Permission],
}

impl Requirement {
    pub const PUBLIC: Requirement = Requirement {
        login: false,
        permissions: &[],
    };

    pub const LOGIN: Requirement = Requirement {
        login: true,
        permissions: &[],
    };

    /// Login plus every listed permission.
    pub const fn permissions(permissions: &'static [Permission]) -> Self {
        Requirement {
            login: true,
            permissions,
        }
    }
}

/// Evaluate `requirement` for `caller`.
///
/// Anonymous callers on anything but a public operation are
/// [`AuthzError::Unauthenticated`]; authenticated callers missing a permission
/// get [`AuthzError::MissingPermission`].
pub fn authorize(caller: &Caller, requirement: &Requirement) -> Result<(), AuthzError> {
    if !requirement.login {
        return Ok(());
    }

    let principal = authenticated(caller)?;

    if let Some(missing) = requirement
        .permissions
        .iter()
        .find(|permission| !principal.has_permission(**permission))
    {
        tracing::warn!(
            username = %principal.username,
            permission = %missing,
            "permission denied"
        );
        return Err(AuthzError::MissingPermission {
            username: principal.username.clone(),
            permission: *missing,
        });
    }

    Ok(())
}

/// The caller's principal, or [`AuthzError::Unauthenticated`].
pub fn authenticated(caller: &Caller) -> Result<&Principal, AuthzError> {
    caller.principal().ok_or(AuthzError::Unauthenticated)
}

/// Bearer-token lookup of configured accounts.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    by_token: HashMap<String, Principal>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the directory from `[auth.users]`, rejecting unknown codenames.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthzError> {
        let mut directory = Self::new();
        for seed in &settings.users {
            let permissions = seed
                .permissions
                .iter()
                .map(|codename| codename.parse::<Permission>())
                .collect::<Result<Vec<_>, _>>()?;
            directory.insert(seed.token.clone(), Principal::new(&seed.username, permissions))?;
        }

        tracing::info!(users = directory.len(), "user directory loaded");
        Ok(directory)
    }

    pub fn insert(
        &mut self,
        token: impl Into<String>,
        principal: Principal,
    ) -> Result<(), AuthzError> {
        let token = token.into();
        if self.by_token.contains_key(&token) {
            return Err(AuthzError::DuplicateToken(principal.username));
        }
        self.by_token.insert(token, principal);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Resolve a presented token; unknown or missing tokens are anonymous.
    pub fn resolve(&self, token: Option<&str>) -> Caller {
        token
            .and_then(|token| self.by_token.get(token))
            .cloned()
            .map(Caller::User)
            .unwrap_or_default()
    }
}
