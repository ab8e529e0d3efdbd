pub mod booking;
pub mod clock;
pub mod flow;
pub mod quota;
pub mod repository;

pub use booking::BookingOrchestrator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use flow::BookingFlow;
pub use quota::{QuotaGuard, SubscriptionProvider, SupabaseSubscriptionProvider};
pub use repository::{BookingRepository, SupabaseBookingRepository};
