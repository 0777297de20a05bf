//! Related-items display specifications declared in schema custom
//! attributes, cached once per connection.

pub mod cache;
pub mod errors;

pub use cache::{RelatedItemsDisplaySpecificationsCache, RELATED_ITEMS_DISPLAY_SPECIFICATIONS};
pub use errors::DisplaySpecError;
