//! Security realm backed by a properties-style credentials file.
//!
//! Each non-comment line of the file reads `user: credential[, role...]`
//! (`=` is accepted in place of `:`). Credentials are either plain text or a
//! SHA-256 digest written as `SHA256:<hex>`. When a console password is
//! configured, the principal `admin` with role `admin` is registered on top of
//! the file's contents.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

const REALM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::realm");
const REALM_NAME: &str = "Console";
const ADMIN_USER: &str = "admin";
const ADMIN_ROLE: &str = "admin";
const SHA256_PREFIX: &str = "SHA256:";

/// Errors raised while loading the credentials file.
#[derive(Debug, Error)]
pub enum RealmError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid credentials entry on line {line}: {message}")]
    Parse { line: usize, message: &'static str },
}

/// Stored credential of a user.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Plain(String),
    Sha256([u8; 32]),
}

impl Credential {
    fn parse(raw: &str) -> Option<Self> {
        match raw.strip_prefix(SHA256_PREFIX) {
            Some(hex) => decode_digest(hex).map(Self::Sha256),
            None => Some(Self::Plain(raw.to_owned())),
        }
    }

    #[must_use]
    pub fn matches(&self, password: &str) -> bool {
        match self {
            Self::Plain(expected) => expected == password,
            Self::Sha256(expected) => Sha256::digest(password.as_bytes()).as_slice() == expected,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => formatter.write_str("Plain(..)"),
            Self::Sha256(_) => formatter.write_str("Sha256(..)"),
        }
    }
}

#[derive(Debug, Clone)]
struct UserEntry {
    credential: Credential,
    roles: BTreeSet<String>,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Result of checking a request against a role constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted(Principal),
    /// No credentials, or credentials that do not match a user.
    Unauthenticated,
    /// Valid credentials lacking the required role.
    Forbidden(Principal),
}

/// Authentication provider attached to the handler chain.
#[derive(Debug, Clone)]
pub struct LoginService {
    name: String,
    users: BTreeMap<String, UserEntry>,
}

impl LoginService {
    /// Parses credentials file contents.
    pub fn parse(contents: &str) -> Result<Self, RealmError> {
        let mut users = BTreeMap::new();
        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let number = index + 1;
            let Some((user, rest)) = line.split_once([':', '=']) else {
                return Err(RealmError::Parse {
                    line: number,
                    message: "missing separator",
                });
            };
            let user = user.trim();
            let mut fields = rest.split(',').map(str::trim);
            let raw_credential = fields.next().unwrap_or_default();
            if user.is_empty() || raw_credential.is_empty() {
                return Err(RealmError::Parse {
                    line: number,
                    message: "missing user or credential",
                });
            }
            let credential = Credential::parse(raw_credential).ok_or(RealmError::Parse {
                line: number,
                message: "malformed SHA256 digest",
            })?;
            let roles = fields
                .filter(|role| !role.is_empty())
                .map(str::to_owned)
                .collect();
            users.insert(user.to_owned(), UserEntry { credential, roles });
        }
        Ok(Self {
            name: REALM_NAME.to_owned(),
            users,
        })
    }

    /// Registers (or replaces) the `admin` principal.
    #[must_use]
    pub fn with_admin(mut self, password: &str) -> Self {
        self.users.insert(
            ADMIN_USER.to_owned(),
            UserEntry {
                credential: Credential::Plain(password.to_owned()),
                roles: BTreeSet::from([ADMIN_ROLE.to_owned()]),
            },
        );
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn authenticate(&self, user: &str, password: &str) -> Option<Principal> {
        let entry = self.users.get(user)?;
        entry.credential.matches(password).then(|| Principal {
            name: user.to_owned(),
            roles: entry.roles.clone(),
        })
    }

    /// Checks an `Authorization` header value against `role`.
    #[must_use]
    pub fn authorise(&self, authorization: Option<&str>, role: &str) -> AuthOutcome {
        let Some(principal) = authorization
            .and_then(decode_basic)
            .and_then(|(user, password)| self.authenticate(&user, &password))
        else {
            return AuthOutcome::Unauthenticated;
        };
        if principal.has_role(role) {
            AuthOutcome::Granted(principal)
        } else {
            AuthOutcome::Forbidden(principal)
        }
    }
}

/// Loads the realm from the credentials file. A console password registers
/// the `admin` principal on top of the file's users. Returns `None` when the
/// file is absent, whatever password is configured.
pub fn load_realm(
    credentials_path: Option<&Path>,
    console_password: Option<&str>,
) -> Result<Option<LoginService>, RealmError> {
    let from_file = match credentials_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(contents) => Some(LoginService::parse(&contents)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(RealmError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        },
        None => None,
    };
    let realm = match (from_file, console_password) {
        (Some(realm), Some(password)) => Some(realm.with_admin(password)),
        (realm, _) => realm,
    };
    match &realm {
        Some(realm) => info!(
            target: REALM_TARGET,
            realm = realm.name(),
            users = realm.user_count(),
            "security realm loaded"
        ),
        None => info!(
            target: REALM_TARGET,
            "no credentials configured; authentication disabled"
        ),
    }
    Ok(realm)
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

fn decode_digest(hex: &str) -> Option<[u8; 32]> {
    let hex = hex.trim();
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut digest = [0_u8; 32];
    for (byte, pair) in digest.iter_mut().zip(hex.as_bytes().chunks(2)) {
        let pair = std::str::from_utf8(pair).ok()?;
        *byte = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(digest)
}
