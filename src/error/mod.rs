mod db;
mod relay;
mod startup;

pub use db::DbError;
pub use relay::{MessageBody, RelayError, ValidationError};
pub use startup::StartupError;
