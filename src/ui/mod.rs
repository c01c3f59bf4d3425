//! TUI 层：Ratatui + crossterm，主循环（app）、事件（event）、渲染（render）、宿主会话（session）

pub mod app;
pub mod event;
pub mod render;
pub mod session;

pub use app::run_app;
pub use event::{AppEvent, Command, EventHandler};
pub use render::draw;
pub use session::{HostEvent, Session};
