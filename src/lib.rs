pub mod clock;
pub mod config;
pub mod countdown;
pub mod event;
pub mod ntp;
pub mod state;
pub mod sync;
pub mod timer;
pub mod traits;
pub mod trigger;
