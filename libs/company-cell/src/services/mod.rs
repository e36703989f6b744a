pub mod gate;
pub mod profile;

pub use gate::CompanyStatusGate;
pub use profile::CompanyProfileService;
