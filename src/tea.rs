//! Table report engine.
//!
//! Reads the category template, matches notes against its rows by tag,
//! extracts weights from brew logs and remaining annotations, and renders the
//! consumption, reserve and purchase reports back into their notes.
//!
//! ```
//! use steep::store::NoteMap;
//! use steep::tea::{self, ReportError};
//! use steep::{EngineConfig, NoteBuilder};
//!
//! let mut notes: NoteMap = [NoteBuilder::new().key("r").content("## Tea Reserve\n").build()]
//!     .into_iter()
//!     .collect();
//! let today = time::macros::date!(2026 - 10 - 14);
//!
//! let err = tea::generate_reserve(&mut notes, &EngineConfig::default(), today).unwrap_err();
//! assert_eq!(err, ReportError::missing_note("Tea Summary Template"));
//! ```

mod error;
pub mod extract;
pub mod format;
pub mod mix;
mod patterns;
pub mod remaining;
pub mod report;
pub mod template;

pub use error::ReportError;
pub use extract::{
    Annotation, Consumptions, Mix, best_rating, format_date, get_consumptions, get_remaining,
    get_remaining_at, is_brew_log, is_mix, is_remaining, load_mixes, parse_date,
};
pub use format::{build_consumption_content, build_purchase_content, build_reserve_content};
pub use mix::{update_mix, update_mixes};
pub use remaining::{
    BrewState, RemainingSummary, brew_state, remaining_summary, update_all_remaining,
    update_remaining,
};
pub use report::{
    RestoredTable, generate_current_consumption, generate_purchase, generate_reserve,
    generate_selected_consumption, restore_reserve_values,
};
pub use template::{TableContext, build_table_context, match_tags};
