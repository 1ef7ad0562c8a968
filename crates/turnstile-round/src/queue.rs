//! FIFO waiting line of requesters.

use std::collections::VecDeque;

use turnstile_protocol::SessionId;

use crate::{QueueError, Requester};

/// A requester's place in line, as reported in `queueUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition<'a> {
    pub requester: &'a Requester,
    /// 1-based.
    pub position: usize,
    pub total: usize,
}

/// Requesters waiting for the game, in arrival order.
///
/// A session appears at most once. The round holder is never in here: it
/// is removed by [`dequeue_front`](Self::dequeue_front) when selected.
#[derive(Debug, Default)]
pub struct TurnQueue {
    entries: VecDeque<Requester>,
}

impl TurnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a requester and returns its 1-based position.
    ///
    /// # Errors
    /// [`QueueError::AlreadyQueued`] if the session is already waiting.
    pub fn enqueue(&mut self, requester: Requester) -> Result<usize, QueueError> {
        if self.contains(requester.session) {
            return Err(QueueError::AlreadyQueued(requester.session));
        }
        self.entries.push_back(requester);
        Ok(self.entries.len())
    }

    /// Takes the requester at the front of the line.
    ///
    /// # Errors
    /// [`QueueError::Empty`] if nobody is waiting.
    pub fn dequeue_front(&mut self) -> Result<Requester, QueueError> {
        self.entries.pop_front().ok_or(QueueError::Empty)
    }

    /// Puts a requester back at the front, ahead of everyone else.
    pub(crate) fn requeue_front(&mut self, requester: Requester) {
        if !self.contains(requester.session) {
            self.entries.push_front(requester);
        }
    }

    /// Removes a session from anywhere in the line.
    ///
    /// Everyone behind it moves up one place.
    pub fn remove(&mut self, session: SessionId) -> Option<Requester> {
        let index = self.entries.iter().position(|r| r.session == session)?;
        self.entries.remove(index)
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.entries.iter().any(|r| r.session == session)
    }

    /// Every waiting requester with its current place in line.
    pub fn positions(&self) -> impl Iterator<Item = QueuePosition<'_>> {
        let total = self.entries.len();
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, requester)| QueuePosition {
                requester,
                position: i + 1,
                total,
            })
    }

    /// Waiting sessions in order.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.entries.iter().map(|r| r.session).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64) -> Requester {
        Requester::new(SessionId(id), format!("p{id}"))
    }

    fn queue_of(ids: &[u64]) -> TurnQueue {
        let mut q = TurnQueue::new();
        for &id in ids {
            q.enqueue(req(id)).unwrap();
        }
        q
    }

    fn positions(q: &TurnQueue) -> Vec<(u64, usize, usize)> {
        q.positions()
            .map(|p| (p.requester.session.0, p.position, p.total))
            .collect()
    }

    // =====================================================================
    // enqueue()
    // =====================================================================

    #[test]
    fn test_enqueue_returns_one_based_position() {
        let mut q = TurnQueue::new();
        assert_eq!(q.enqueue(req(1)), Ok(1));
        assert_eq!(q.enqueue(req(2)), Ok(2));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_enqueue_duplicate_session_is_rejected() {
        let mut q = queue_of(&[1]);

        assert_eq!(
            q.enqueue(req(1)),
            Err(QueueError::AlreadyQueued(SessionId(1)))
        );
        assert_eq!(q.len(), 1);
    }

    // =====================================================================
    // dequeue_front()
    // =====================================================================

    #[test]
    fn test_dequeue_front_is_fifo() {
        let mut q = queue_of(&[3, 1, 2]);

        assert_eq!(q.dequeue_front().unwrap().session, SessionId(3));
        assert_eq!(q.dequeue_front().unwrap().session, SessionId(1));
        assert_eq!(q.dequeue_front().unwrap().session, SessionId(2));
    }

    #[test]
    fn test_dequeue_front_empty_returns_error() {
        let mut q = TurnQueue::new();
        assert_eq!(q.dequeue_front(), Err(QueueError::Empty));
    }

    #[test]
    fn test_requeue_front_jumps_the_line() {
        let mut q = queue_of(&[2, 3]);
        q.requeue_front(req(1));
        assert_eq!(q.sessions(), vec![SessionId(1), SessionId(2), SessionId(3)]);
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_middle_renumbers_the_rest() {
        let mut q = queue_of(&[1, 2, 3]);

        let removed = q.remove(SessionId(2));

        assert_eq!(removed.map(|r| r.session), Some(SessionId(2)));
        assert_eq!(positions(&q), vec![(1, 1, 2), (3, 2, 2)]);
    }

    #[test]
    fn test_remove_absent_returns_none() {
        let mut q = queue_of(&[1]);
        assert!(q.remove(SessionId(9)).is_none());
        assert_eq!(q.len(), 1);
    }

    // =====================================================================
    // positions()
    // =====================================================================

    #[test]
    fn test_positions_are_contiguous_from_one() {
        let q = queue_of(&[5, 6, 7]);
        assert_eq!(positions(&q), vec![(5, 1, 3), (6, 2, 3), (7, 3, 3)]);
    }

    #[test]
    fn test_positions_of_empty_queue_is_empty() {
        assert_eq!(TurnQueue::new().positions().count(), 0);
    }
}
