pub mod callback_log;
pub mod scripted_library;

pub use callback_log::CallbackLog;
pub use scripted_library::{PendingJoin, ScriptedLibrary};
pub use scripted_room::ScriptedRoom;

/// Routes `log` output through env_logger for the duration of a test run.
pub fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}
