//! Profile artifacts on disk
//!
//! - `naming`: `mprofile_<YYYYMMDDHHMMSS>.dat` names and their `_ts` siblings
//! - `writer`: append-only, line-at-a-time persistence of records
//! - `reader`: parse an artifact back into a memory series and labeled spans
//! - `index`: the ordered set of artifacts in a directory, positional lookup,
//!   removal

pub mod index;
pub mod naming;
pub mod reader;
pub mod writer;

pub use index::{remove_profiles, ProfileIndex};
pub use naming::{artifact_name, artifact_start_time, timestamp_sibling};
pub use reader::{read_profile, ProfileData, Span};
pub use writer::{ProfileWriter, RecordSink};
