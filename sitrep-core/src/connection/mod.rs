mod manager;

pub use manager::{ConnectionManager, ENCRYPTED_LABEL};
