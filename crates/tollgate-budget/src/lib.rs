mod admission;
mod alerts;
mod ledger;
mod throttle;

pub use admission::{AdmissionConfig, AdmissionController};
pub use alerts::{EscalationMonitor, RecordingAlertSink, TracingAlertSink};
pub use ledger::{BudgetLedger, LedgerSnapshot, PERIOD_KEY};
pub use throttle::state_for;
