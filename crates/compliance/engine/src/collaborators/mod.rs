//! Narrow contracts to the systems the engine does not own
//!
//! - [`Storage`]: companies, records and steps
//! - [`Notifier`]: email, chat and dashboard delivery
//! - [`ReportPublisher`]: report fan-out
//!
//! In-memory implementations back tests and the command-line host.

pub mod memory;
pub mod notifier;
pub mod publisher;
pub mod storage;

pub use memory::InMemoryStorage;
pub use notifier::{
    Channel, DeliveryStatus, InMemoryNotifier, Notification, Notifier, NotifyError, SentNotification,
};
pub use publisher::{DistributionRecord, DistributionStatus, NotifierPublisher, ReportPublisher};
pub use storage::{
    CompanyStorage, RecordQuery, RecordStorage, StepQuery, StepStorage, Storage, StorageError,
    StorageResult,
};
