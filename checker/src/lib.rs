pub mod checkpoint;
pub mod error;
pub mod local;
pub mod oracle;
pub mod remote;
pub mod report;

pub use error::OracleError;
pub use oracle::RouteStatusOracle;
pub use report::RouteStatusResult;
