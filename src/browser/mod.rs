pub mod connection;
pub mod launch;
pub mod launcher;

pub use connection::connect_to_browser;
pub use launch::{launch_browser, BrowserProfile, BrowserSession};
pub use launcher::{BrowserAccount, BrowserHost, BrowserLauncher, ChromeLauncher};
