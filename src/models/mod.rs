pub mod instructor;
pub mod order;
pub mod pending_order;
pub mod rate;
pub mod workshop;

pub use instructor::Instructor;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, Settlement, SettlementOutcome};
pub use pending_order::{
    to_new_order, OrderSkeleton, PendingOrder, RateLine, SessionStateError, TicketDraft,
};
pub use rate::{filter_rates, CapacityShortfall, NewRate, Rate, TallyError};
pub use workshop::{Availability, NewWorkshop, Workshop};
