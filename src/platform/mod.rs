//! Browser implementations of the core's platform traits, plus DOM event
//! plumbing.

pub mod clipboard;
pub mod events;
pub mod scheduler;
pub mod storage;
pub mod wake_lock;

pub use scheduler::BrowserScheduler;
pub use storage::SessionStore;
pub use wake_lock::NavigatorWakeLock;
