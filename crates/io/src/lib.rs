pub mod errors;
pub mod files;
pub mod hash_index;
pub mod seed_matches_file;
pub mod sequences;
pub mod structs;

pub use errors::{PcpeIoError, PcpeIoResult};
pub use structs::seed_match::SeedMatch;
