pub mod error;
pub mod file_access;
pub mod result;

pub use error::*;
pub use file_access::*;
pub use result::*;
