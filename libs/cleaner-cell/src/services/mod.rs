pub mod gate;
pub mod profile;

pub use gate::CleanerStatusGate;
pub use profile::CleanerProfileService;
