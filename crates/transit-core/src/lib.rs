pub mod catalog;
pub mod comparison;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod matching;
pub mod period;
pub mod photometry;
pub mod pipeline;
pub mod stats;
pub mod target;
