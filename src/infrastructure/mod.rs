pub mod page_driver;
pub mod scratch;

pub use page_driver::{PageActions, PageDriver};
pub use scratch::ScratchDir;
