mod identity;
mod record;

pub use identity::Identity;
pub use record::Record;
