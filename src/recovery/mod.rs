// BayunGraph Recovery Module
//
// Brings a database back to a consistent state after an unclean shutdown
// by replaying its transaction log against the stores.

pub mod error;
pub mod availability;
pub mod monitor;
pub mod index_rebuild;
pub mod start_locator;
pub mod replay;
pub mod id_repair;
pub mod facade;

// Public exports
pub use error::{DatabaseStartAborted, RecoveryCheckError, RecoveryError, Result};
pub use availability::{AvailabilityGuard, AvailabilityState};
pub use monitor::{LoggingRecoveryMonitor, Monitors, RecoveryMonitor};
pub use index_rebuild::{IndexPopulator, IndexRebuildSchedule, RecordingIndexPopulator};
pub use start_locator::{RecoveryStartInformation, RecoveryStartLocator};
pub use replay::{ForwardReplayEngine, TransactionApplier};
pub use facade::{is_recovery_required, perform_recovery, RecoveryFacade, RecoveryOutcome};
