//! The requester record carried through queue and round.

use rand::Rng;
use turnstile_protocol::SessionId;

/// A requester waiting for, or holding, the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// The session this record belongs to.
    pub session: SessionId,

    /// Normalized display name, shown to the resource.
    pub display_name: String,

    /// Last score the resource pushed while this requester was active.
    pub score: u64,

    /// Opaque id used to correlate `requestFinalScore` with its answer and
    /// to label the stored game session.
    pub user_id: String,
}

impl Requester {
    /// A fresh record with a zero score and a random user id.
    pub fn new(session: SessionId, display_name: impl Into<String>) -> Self {
        Self {
            session,
            display_name: display_name.into(),
            score: 0,
            user_id: generate_user_id(),
        }
    }
}

/// 128 random bits as 32 lowercase hex characters.
fn generate_user_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requester_starts_at_zero() {
        let r = Requester::new(SessionId(1), "ada");
        assert_eq!(r.score, 0);
        assert_eq!(r.display_name, "ada");
    }

    #[test]
    fn test_user_id_is_32_hex_chars() {
        let r = Requester::new(SessionId(1), "ada");
        assert_eq!(r.user_id.len(), 32);
        assert!(r.user_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_user_ids_are_unique() {
        let a = Requester::new(SessionId(1), "ada");
        let b = Requester::new(SessionId(1), "ada");
        assert_ne!(a.user_id, b.user_id);
    }
}
