mod chat;
mod config;
mod history;
mod import;
mod index;
mod search;
mod status;

pub use chat::ChatArgs;
pub use config::ConfigCommand;
pub use history::HistoryCommand;
pub use import::ImportArgs;
pub use index::IndexArgs;
pub use search::SearchArgs;

pub use chat::handle_chat;
pub use config::handle_config;
pub use history::handle_history;
pub use import::handle_import;
pub use index::handle_index;
pub use search::handle_search;
pub use status::handle_status;
