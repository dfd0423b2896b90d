mod error;
mod page;
mod record;
mod schema;
mod table_manager;
mod value;

pub use error::{StorageError, StorageResult};
pub use page::{Page, PageHeader};
pub use record::{Record, Rid};
pub use schema::{Column, Schema};
pub use table_manager::TableManager;
pub use value::{FieldType, Value};
