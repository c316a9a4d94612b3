pub mod scanner;
pub mod offsets;
pub mod normalize;
pub mod housekeeping;
pub mod importer;

pub use scanner::{CsvCandidate, list_candidates, pick_latest};
pub use offsets::{OffsetMap, OffsetStore, offset_key};
pub use normalize::{RowRecord, normalize_phone, normalize_row};
pub use housekeeping::{truncate_to_header, write_health_marker};
pub use importer::{CheckpointFn, ImportReport, ImportStatus, Importer, count_rows};
