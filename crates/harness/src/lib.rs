pub mod depot;
pub mod technician;

pub use depot::TestDepot;
pub use technician::TestTechnician;
