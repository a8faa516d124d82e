pub mod account;
pub mod alert;
pub mod notification;
pub mod position;
pub mod summary;

pub use account::{Account, AccountPatch, AccountStatus};
pub use alert::{AlertKind, AlertRecord, DrawdownScope, NewAlert};
pub use notification::Notification;
pub use position::OpenPosition;
pub use summary::CycleSummary;
