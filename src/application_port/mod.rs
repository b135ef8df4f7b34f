mod reissue_api;

pub use reissue_api::*;
