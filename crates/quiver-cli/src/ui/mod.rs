//! Terminal output.
//!
//! ```text
//! commands / install workers
//!        │ Reporter calls
//!        ▼
//!     Output       cloneable handle, sends events
//!        │
//!        ▼
//!     actor        single thread owning stdout and slot state
//!        │
//!        ▼
//!    SlotFrame     one row per package argument (TTY only)
//! ```

pub mod actor;
pub mod engine;
pub mod output;
pub mod theme;

pub use engine::SlotFrame;
pub use output::Output;
pub use theme::Theme;
