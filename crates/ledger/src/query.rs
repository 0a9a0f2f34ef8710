use crate::{UserId, model::CartLine};

/// Selects cart lines for one user, optionally narrowed by flag values.
///
/// Used both for reads and for bulk deletes, so a query and the sweep that
/// follows it match exactly the same lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartFilter {
    /// Owner of the lines.
    pub user_id: UserId,

    /// Required value of the checked-out flag, if any.
    pub checked_out: Option<bool>,

    /// Required value of the confirmed flag, if any.
    pub confirmed: Option<bool>,
}

impl CartFilter {
    /// Matches every line for the user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            checked_out: None,
            confirmed: None,
        }
    }

    /// Matches lines that are both checked out and confirmed.
    pub fn confirmed_for(user_id: UserId) -> Self {
        Self::for_user(user_id).checked_out(true).confirmed(true)
    }

    /// Filters by the checked-out flag.
    pub fn checked_out(mut self, value: bool) -> Self {
        self.checked_out = Some(value);
        self
    }

    /// Filters by the confirmed flag.
    pub fn confirmed(mut self, value: bool) -> Self {
        self.confirmed = Some(value);
        self
    }

    /// Returns true if the line satisfies every set criterion.
    pub fn matches(&self, line: &CartLine) -> bool {
        if line.user_id != self.user_id {
            return false;
        }
        if let Some(checked_out) = self.checked_out
            && line.is_checked_out() != checked_out
        {
            return false;
        }
        if let Some(confirmed) = self.confirmed
            && line.is_confirmed() != confirmed
        {
            return false;
        }
        true
    }
}
