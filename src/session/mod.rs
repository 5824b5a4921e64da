//! Browser session control over the Chrome DevTools Protocol.
//!
//! The session attaches to an **already-running, already-logged-in** Chrome
//! started with `--remote-debugging-port`. It never launches a browser and
//! never touches credentials; if nothing is listening on the endpoint the
//! attach fails with a typed `ConnectionError`.
//!
//! One session owns one page. All navigation and capture goes through that
//! page, serialized by `&mut self` — concurrent navigation on a shared
//! debugging endpoint corrupts page state.

mod controller;
pub mod retry;

pub use controller::Session;
pub use retry::RetryPolicy;
