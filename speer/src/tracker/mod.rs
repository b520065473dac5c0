pub mod announce;
pub mod response;
pub mod url;
