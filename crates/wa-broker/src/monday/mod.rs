//! monday.com client: OAuth, board bootstrap and file import.

mod boards;
mod error;
mod import;
mod oauth;

pub use boards::MondayClient;
pub use error::{MondayError, MondayResult};
pub use import::{BoardImporter, ImportSummary, TargetGroup, classify};
pub use oauth::MondayOAuth;
