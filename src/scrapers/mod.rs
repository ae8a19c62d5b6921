pub mod browser;
pub mod traits;

pub use browser::{ChromePage, ChromePageSource};
pub use traits::{LivePage, PageSource};
