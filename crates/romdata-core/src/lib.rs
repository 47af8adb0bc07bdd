//! romdata-core: read-only metadata extraction for ROM, music and save files
//!
//! This crate focuses on a small, well-factored surface:
//! - Bounded cursor and tag dispatcher shared by the tag-stream readers
//! - Per-format readers: SNDH, VGM (+GD3), GameCube CISO, PlayStation PSV
//! - Format detection over any positional byte source
//! - Display fields and JSON export for CLI use
//!
pub mod ciso;
pub mod cursor;
pub mod detect;
pub mod error;
pub mod format;
pub mod json;
pub mod model;
pub mod psv;
pub mod sndh;
pub mod source;
pub mod tagstream;
pub mod text;
pub mod vgm;

pub use ciso::{BlockAddr, BlockMap, CisoImage};
pub use detect::{ReadLimits, RomInfo, detect};
pub use error::{BadNumber, Error, ParseError, Result};
pub use json::{JsonOpts, dump_dir_map_json, dump_file_json, info_to_json};
pub use model::{Field, FieldValue};
pub use source::ByteSource;
