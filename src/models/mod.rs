pub mod events;
pub mod insurance;
pub mod jobs;
pub mod messages;
pub mod payments;
pub mod trips;
pub mod vehicles;
