mod link;

pub use self::link::{CANONICAL, CoverLink};
pub(crate) use self::link::CoverRow;
