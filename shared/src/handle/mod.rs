mod error;
#[allow(clippy::module_inception)]
mod handle;
mod handle_table;

pub use error::HandleError;
pub use handle::{Handle, HandleGenerator};
pub use handle_table::HandleTable;
