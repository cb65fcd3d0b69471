mod ids;
mod note;
mod tag_kind;

pub use ids::NoteKey;
pub use note::{Note, NoteBuilder};
pub use tag_kind::{
    BEST_BREW_PREFIX, CONTAINER_PREFIX, FINISHED, FINISHED_ALT, PERIOD_PREFIX, Period, TagKind,
    WEIGHT_PREFIX,
};
