//! HTTP handlers, one per FHIR interaction.

mod capabilities;
mod create;
mod delete;
mod history;
mod patch;
mod read;
mod search;
mod update;
mod vread;

pub use capabilities::capabilities_handler;
pub use create::create_handler;
pub use delete::delete_handler;
pub use history::history_handler;
pub use patch::patch_handler;
pub use read::read_handler;
pub use search::search_handler;
pub use update::update_handler;
pub use vread::vread_handler;
