// ── Resource kinds and view gating ──
//
// `ResourceKind` is a closed enumeration: one cache slot and one
// polling-policy row per kind, exhaustively checkable. The visibility
// gate lives here as a single table instead of per-caller checks.

use strum::{Display, EnumIter};

/// One category of daemon-exposed state with its own cache slot and
/// polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Status,
    Projects,
    Tasks,
    Transfers,
    Messages,
    Notices,
    Statistics,
    DiskUsage,
    AcctMgrInfo,
    State,
}

impl ResourceKind {
    /// Fixed scheduling priority: status first, then messages (the
    /// daemon's message buffer is bounded, so under-polling loses
    /// entries permanently), then everything else.
    pub const PRIORITY_ORDER: [Self; 10] = [
        Self::Status,
        Self::Messages,
        Self::Projects,
        Self::Tasks,
        Self::Transfers,
        Self::Notices,
        Self::Statistics,
        Self::DiskUsage,
        Self::AcctMgrInfo,
        Self::State,
    ];

    /// The UI view that must be visible for this kind to be polled, or
    /// `None` if the kind is polled unconditionally.
    ///
    /// Status and messages are always polled (messages because buffer
    /// loss must be avoided even with the view closed). The full state
    /// and account-manager info are background-cadence fetches with no
    /// corresponding view. A kind that has never been fetched bypasses
    /// the gate regardless, so the first Connected tick populates
    /// everything.
    pub fn gating_view(self) -> Option<ViewKind> {
        match self {
            Self::Status | Self::Messages | Self::AcctMgrInfo | Self::State => None,
            Self::Projects => Some(ViewKind::Projects),
            Self::Tasks => Some(ViewKind::Tasks),
            Self::Transfers => Some(ViewKind::Transfers),
            Self::Notices => Some(ViewKind::Notices),
            Self::Statistics => Some(ViewKind::Statistics),
            Self::DiskUsage => Some(ViewKind::Disk),
        }
    }
}

/// A UI view whose visibility gates polling of its resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ViewKind {
    Projects,
    Tasks,
    Transfers,
    Notices,
    Statistics,
    Disk,
}

/// Set of currently visible views, passed to every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewMask(u8);

impl ViewMask {
    pub const NONE: Self = Self(0);

    fn bit(view: ViewKind) -> u8 {
        match view {
            ViewKind::Projects => 1,
            ViewKind::Tasks => 2,
            ViewKind::Transfers => 4,
            ViewKind::Notices => 8,
            ViewKind::Statistics => 16,
            ViewKind::Disk => 32,
        }
    }

    pub fn single(view: ViewKind) -> Self {
        Self(Self::bit(view))
    }

    pub fn all() -> Self {
        Self(63)
    }

    pub fn with(self, view: ViewKind) -> Self {
        Self(self.0 | Self::bit(view))
    }

    pub fn contains(self, view: ViewKind) -> bool {
        self.0 & Self::bit(view) != 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn priority_order_covers_every_kind_once() {
        for kind in ResourceKind::iter() {
            let count = ResourceKind::PRIORITY_ORDER
                .iter()
                .filter(|k| **k == kind)
                .count();
            assert_eq!(count, 1, "{kind} must appear exactly once");
        }
    }

    #[test]
    fn status_and_messages_are_ungated() {
        assert_eq!(ResourceKind::Status.gating_view(), None);
        assert_eq!(ResourceKind::Messages.gating_view(), None);
    }

    #[test]
    fn mask_membership() {
        let mask = ViewMask::single(ViewKind::Tasks).with(ViewKind::Disk);
        assert!(mask.contains(ViewKind::Tasks));
        assert!(mask.contains(ViewKind::Disk));
        assert!(!mask.contains(ViewKind::Projects));

        for view in ViewKind::iter() {
            assert!(ViewMask::all().contains(view));
            assert!(!ViewMask::NONE.contains(view));
        }
    }
}
