mod expiry;
mod request;
mod storage_key;
mod token;

pub use expiry::*;
pub use request::*;
pub use storage_key::*;
pub use token::*;
