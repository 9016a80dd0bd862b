pub mod clock;
pub mod compositor;
pub mod error;
pub mod handle;
pub mod keyboard;
pub mod layout;
pub mod logging;
pub mod pool;
pub mod render_loop;
pub mod session;
pub mod surface;
