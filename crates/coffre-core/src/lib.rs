pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use error::{CoffreError, CoffreResult};
pub use policy::PasswordPolicy;
pub use types::{FileRecord, NewRecord, RecordId};
