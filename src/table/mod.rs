pub(crate) mod cff;
mod cff2;
mod glyf;
mod gvar;
pub(crate) mod ivs;
mod loca;

pub use self::cff::*;
pub use self::cff2::*;
pub use self::glyf::*;
pub use self::gvar::*;
pub use self::ivs::*;
pub use self::loca::*;
