//! Services module for business logic

pub mod fanout;
pub mod order_intake;
pub mod order_token;
pub mod reconciliation;

pub use fanout::{DispatchSummary, FanOutOrchestrator};
pub use order_intake::{CreateOrderRequest, CreatedOrder, OrderIntakeService};
pub use order_token::OrderTokenSigner;
pub use reconciliation::{ReconcileError, ReconciliationService};
