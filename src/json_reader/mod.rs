//! JSON reading of stored instances through the mapped schema.

pub mod display_info;
pub mod errors;
pub mod executor;
pub mod format;
pub mod reader;
pub mod statement_cache;

pub use display_info::{
    CategoryInfo, ClassInfo, DisplayInfo, JsonDocument, PropertyInfo, RowConsolidator,
    DEFAULT_CATEGORY,
};
pub use errors::ReaderError;
pub use executor::{PreparedStatement, Row, StatementExecutor};
pub use format::{FormatOptions, InstanceFormatter, Int64Format, MemberNameCasing};
pub use reader::{JsonReader, ReadState, ReaderOptions};
pub use statement_cache::{CacheMetrics, StatementCache};
