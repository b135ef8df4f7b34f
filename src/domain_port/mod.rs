mod key_value_store;
mod request_sender;

pub use key_value_store::*;
pub use request_sender::*;
