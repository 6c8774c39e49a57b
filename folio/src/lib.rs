use folio_core::storage::Library;

pub mod cli;
pub mod commands;

pub struct AppContext {
    pub library: Library,
    /// Print results as JSON instead of text.
    pub json: bool,
}
