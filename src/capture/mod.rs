//! Screen capture and input injection for the game window (Windows only).
//!
//! - `window`: locating the game window and client-area geometry
//! - `screenshot`: Graphics Capture API frames as `RgbaImage`
//! - `input`: `SendInput` mouse moves, clicks and wheel ticks
//! - `driver`: `WindowsDriver`, the `ScreenDriver` used by live scans

pub mod driver;
pub mod input;
pub mod screenshot;
pub mod window;

pub use driver::WindowsDriver;
