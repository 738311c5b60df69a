/// A confirmed value plus an optional optimistic one awaiting confirmation.
///
/// Readers see the proposed value while it is outstanding. The caller
/// either commits it once the store accepts the write or reverts to the
/// last confirmed value when the write fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    committed: T,
    proposed: Option<T>,
}

impl<T: Clone> Pending<T> {
    pub fn new(committed: T) -> Self {
        Self {
            committed,
            proposed: None,
        }
    }

    pub fn current(&self) -> &T {
        self.proposed.as_ref().unwrap_or(&self.committed)
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn is_pending(&self) -> bool {
        self.proposed.is_some()
    }

    /// Replaces any outstanding proposal.
    pub fn propose(&mut self, value: T) {
        self.proposed = Some(value);
    }

    pub fn commit(&mut self) -> &T {
        if let Some(value) = self.proposed.take() {
            self.committed = value;
        }
        &self.committed
    }

    /// Commits a value that differs from the proposal, e.g. the row as the store returned it.
    pub fn commit_with(&mut self, confirmed: T) -> &T {
        self.proposed = None;
        self.committed = confirmed;
        &self.committed
    }

    pub fn revert(&mut self) -> &T {
        self.proposed = None;
        &self.committed
    }

    pub fn into_committed(self) -> T {
        self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::Pending;

    #[test]
    fn proposal_is_visible_until_resolved() {
        let mut hours = Pending::new(8.0);
        hours.propose(8.5);
        assert!(hours.is_pending());
        assert_eq!(*hours.current(), 8.5);
        assert_eq!(*hours.committed(), 8.0);

        assert_eq!(*hours.commit(), 8.5);
        assert!(!hours.is_pending());
    }

    #[test]
    fn revert_restores_committed_value() {
        let mut hours = Pending::new(8.0);
        hours.propose(7.5);
        assert_eq!(*hours.revert(), 8.0);
        assert_eq!(*hours.current(), 8.0);
        assert!(!hours.is_pending());
    }

    #[test]
    fn commit_with_store_value() {
        let mut hours = Pending::new(8.0);
        hours.propose(8.25);
        hours.commit_with(8.3);
        assert_eq!(hours.into_committed(), 8.3);
    }
}
