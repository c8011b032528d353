pub mod account;
pub mod endpoint;
pub mod field;
pub mod project;
pub mod record;

pub use account::{Account, AccountTier};
pub use endpoint::{Condition, ConditionOp, DataSourceMode, Endpoint, PaginationSettings};
pub use field::{FieldSpec, FieldType};
pub use project::{AuthSettings, Project};
pub use record::{MockRecord, StoredFile};
