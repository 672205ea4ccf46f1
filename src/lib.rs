//! UK capital gains calculation for share disposals.
//!
//! Disposals are matched against acquisitions using the same-day rule, the
//! 30 day bed & breakfast rule and finally the section 104 pool, with all
//! values converted to GBP.

pub mod cmd;
pub mod core;
pub mod utils;
