//! Client-side authentication state and navigation gating
//!
//! [`AuthStateMachine`] is the single writer of [`AuthState`]:
//!
//! ```text
//! Idle ──login──▶ Loading ──▶ Succeeded
//!                        └──▶ Failed
//! any  ──logout──▶ Idle
//! ```
//!
//! [`select_active_tree`] turns the derived `is_authenticated` flag and the
//! user's roles into the screen tree the UI should show.

pub mod gate;
pub mod machine;
pub mod state;

pub use gate::{ActiveTree, select_active_tree};
pub use machine::{AuthStateMachine, DEFAULT_LOGIN_ERROR};
pub use state::{AuthState, AuthStatus};
