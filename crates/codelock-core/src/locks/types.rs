//! ============================================================================
//! Lock Records
//! ============================================================================
//! The four-digit keypad code and the per-object lock record it protects.
//! `LockCode` enforces its range at every boundary (construction, parsing,
//! deserialization), so a `CodeLock` in memory or on disk always holds a
//! valid code.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{ActorId, InstanceId};

/// Largest value a four-digit code can take.
pub const MAX_CODE: u16 = 9999;

/// A four-digit keypad code. Leading zeros are significant for display and
/// entry: the value 42 is the code "0042".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct LockCode(u16);

impl LockCode {
    /// Validate a numeric value as a code.
    pub fn new(value: u16) -> Result<Self, InvalidCode> {
        if value > MAX_CODE {
            return Err(InvalidCode::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The numeric value (0..=9999).
    pub fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for LockCode {
    type Error = InvalidCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LockCode> for u16 {
    fn from(code: LockCode) -> Self {
        code.0
    }
}

impl fmt::Display for LockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for LockCode {
    type Err = InvalidCode;

    /// Accepts exactly four ASCII digits; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidCode::NotFourDigits(s.to_string()));
        }
        let value = s
            .parse::<u16>()
            .map_err(|_| InvalidCode::NotFourDigits(s.to_string()))?;
        Self::new(value)
    }
}

/// Rejected code input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCode {
    #[error("code {0} is out of range (0-9999)")]
    OutOfRange(u16),
    #[error("code {0:?} must be exactly four digits (ex. 1234)")]
    NotFourDigits(String),
}

/// A code lock bound to one protected object.
///
/// `users` is insertion-ordered and append-only: the first entry is the
/// owner (the actor who set the code), later entries are actors remembered
/// after entering the code correctly. Changing the code keeps the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeLock {
    pub instance_id: InstanceId,
    pub code: LockCode,
    pub users: Vec<ActorId>,
}

impl CodeLock {
    /// New lock owned by the actor who set the code.
    pub fn new(instance_id: InstanceId, code: LockCode, owner: ActorId) -> Self {
        Self {
            instance_id,
            code,
            users: vec![owner],
        }
    }

    /// The actor who created the lock (first remembered user).
    pub fn owner(&self) -> Option<ActorId> {
        self.users.first().copied()
    }

    /// Whether this actor created the lock.
    pub fn is_owner(&self, actor_id: ActorId) -> bool {
        self.owner() == Some(actor_id)
    }

    /// Whether this actor has been remembered on the lock.
    pub fn remembers(&self, actor_id: ActorId) -> bool {
        self.users.contains(&actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display_pads_leading_zeros() {
        assert_eq!(LockCode::new(42).unwrap().to_string(), "0042");
        assert_eq!(LockCode::new(0).unwrap().to_string(), "0000");
        assert_eq!(LockCode::new(9999).unwrap().to_string(), "9999");
    }

    #[test]
    fn test_code_rejects_out_of_range() {
        assert_eq!(LockCode::new(10000), Err(InvalidCode::OutOfRange(10000)));
        assert_eq!(LockCode::new(u16::MAX), Err(InvalidCode::OutOfRange(u16::MAX)));
    }

    #[test]
    fn test_code_parses_exactly_four_digits() {
        assert_eq!("1234".parse::<LockCode>().unwrap().value(), 1234);
        assert_eq!("0042".parse::<LockCode>().unwrap().value(), 42);

        for bad in ["123", "12345", "12a4", "12.4", " 123", "-123", ""] {
            assert!(
                bad.parse::<LockCode>().is_err(),
                "{:?} should not parse as a code",
                bad
            );
        }
    }

    #[test]
    fn test_code_serde_rejects_out_of_range() {
        let code: LockCode = serde_json::from_str("7").unwrap();
        assert_eq!(code.value(), 7);
        assert!(serde_json::from_str::<LockCode>("10000").is_err());
    }

    #[test]
    fn test_code_serializes_as_number() {
        let code = LockCode::new(42).unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "42");
    }

    #[test]
    fn test_lock_owner_is_first_user() {
        let owner = ActorId(100);
        let mut lock = CodeLock::new(InstanceId(7), LockCode::new(1234).unwrap(), owner);
        lock.users.push(ActorId(200));

        assert_eq!(lock.owner(), Some(owner));
        assert!(lock.is_owner(owner));
        assert!(!lock.is_owner(ActorId(200)));
        assert!(lock.remembers(ActorId(200)));
        assert!(!lock.remembers(ActorId(300)));
    }
}
