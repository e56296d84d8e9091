pub mod config;
pub mod intent;
pub mod lex;
pub mod models;
pub mod replies;
pub mod ticket;

pub use config::{ConfigError, DispatcherConfig};
pub use intent::SupportIntent;
pub use lex::{LexEvent, LexResponse};
pub use models::*;
pub use ticket::{ticket_id_at, Ticket};
