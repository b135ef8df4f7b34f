mod reissue_api_http;
mod request_sender_reqwest;

pub use reissue_api_http::*;
pub use request_sender_reqwest::*;
