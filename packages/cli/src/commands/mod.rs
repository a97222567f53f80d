pub mod format;
pub mod init;
pub mod pages;
pub mod project_files;
pub mod resolve;

pub use format::{format, FormatArgs};
pub use init::{init, InitArgs};
pub use pages::{pages, PagesArgs};
pub use resolve::{resolve, ResolveArgs};
