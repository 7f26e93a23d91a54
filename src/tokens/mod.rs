pub mod session;

pub use session::{RefreshError, SessionManager};
