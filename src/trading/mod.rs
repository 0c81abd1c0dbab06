pub mod desk;
pub mod portfolio;
pub mod report;

pub use desk::{PortfolioBook, RiskDesk, Submission};
pub use portfolio::{ClosedTrade, ExitReason, OpenPosition, PortfolioState};
pub use report::RiskReport;
