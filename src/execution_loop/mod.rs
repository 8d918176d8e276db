pub mod record;
pub mod state;
pub mod r#loop;

pub use record::*;
pub use state::*;
pub use r#loop::*;
