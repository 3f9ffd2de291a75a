pub mod entry;
pub mod io;
pub mod onepassword;
pub mod push;
pub mod record;
pub mod title;

pub mod prelude {
    pub use crate::entry::{EntryError, build_record};
    pub use crate::push::{ItemArgs, PushError};
    pub use crate::record::Record;
}
