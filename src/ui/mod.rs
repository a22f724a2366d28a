//! User interface rendering and input handling.
//!
//! - **login**: Connection form shown before and between sessions
//! - **renderer**: Draws the login form and session snapshots
//! - **keymapper**: Terminal key events to engine keys

pub mod keymapper;
pub mod login;
pub mod renderer;

pub use keymapper::KeyMapper;
pub use login::LoginForm;
pub use renderer::{visible_rows, Renderer};
