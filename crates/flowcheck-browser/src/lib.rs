//! Browser interface, element resolution and diagnostics for flowcheck
//!
//! Flows never talk to a browser library directly. They are written against
//! [`BrowserDriver`], reach it through an exclusively owned [`Session`], and
//! locate elements with [`SelectorResolver`].
//!
//! # Features
//!
//! - **Driver interface**: navigation, load signals, visible-element queries, actions, contexts, screenshots
//! - **Chrome driver**: `headless_chrome` over CDP ([`chrome::ChromeDriver`])
//! - **Resolution**: ordered candidate fallback plus a labeled heuristic scan
//! - **Diagnostics**: timestamped screenshots that never alter a verdict
//! - **Scripted driver** (feature `scripted`): an in-memory page for tests
//!
//! # Example
//!
//! ```no_run
//! use flowcheck_browser::chrome::ChromeDriver;
//! use flowcheck_browser::{BrowserDriver, SearchScope, SelectorResolver, Session};
//! use flowcheck_core::config::BrowserSettings;
//! use flowcheck_core::SelectorCandidates;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = ChromeDriver::launch(BrowserSettings::default(), Duration::from_secs(30)).await?;
//!     let session = Session::new(driver);
//!     session.driver().navigate("https://example.com/myaccount").await?;
//!
//!     let email = SelectorCandidates::parse(&["#login-email", "input[type='email']"])?;
//!     let found = SelectorResolver::new(session.driver())
//!         .resolve_within(&email, &SearchScope::Page, Duration::from_secs(15))
//!         .await?;
//!     println!("{}", found.describe("identifier field"));
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod chrome;
pub mod diagnostics;
pub mod driver;
pub mod resolver;
pub mod session;

#[cfg(any(test, feature = "scripted"))]
pub mod scripted;

// Re-export commonly used types
pub use diagnostics::{DiagnosticsRecorder, ScreenshotOptions};
pub use driver::{BrowserDriver, ContextId, ElementHandle, SearchScope};
pub use resolver::{Resolution, SelectorResolver, Strategy};
pub use session::{Session, SessionFactory};
