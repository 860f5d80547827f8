//! Service implementations for the Coda API.

mod docs;
mod mutations;
mod rows;
mod tables;

pub use docs::DocsService;
pub use mutations::{MutationsService, WaitOptions};
pub use rows::RowsService;
pub use tables::TablesService;
