use crate::store::SavedPostId;

/// Favorite status of one displayed post. The pending states are the only
/// window in which the view may differ from durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteState {
    #[default]
    Unfavorited,
    PendingCreate,
    Favorited { saved_id: SavedPostId },
    PendingDelete { saved_id: SavedPostId },
}

impl FavoriteState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingCreate | Self::PendingDelete { .. })
    }

    /// What the user sees: pending states show their optimistic target.
    pub fn appears_favorited(&self) -> bool {
        matches!(self, Self::PendingCreate | Self::Favorited { .. })
    }

    pub fn saved_id(&self) -> Option<SavedPostId> {
        match self {
            Self::Favorited { saved_id } | Self::PendingDelete { saved_id } => Some(*saved_id),
            _ => None,
        }
    }
}
