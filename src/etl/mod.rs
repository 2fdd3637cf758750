/// ETL Pipeline Module
///
/// This module holds the per-file stages of the warehouse load:
/// - Discover: find data files below a root directory
/// - Extract: read a file and emit ordered statement invocations
/// - Transform: derive dimension and fact rows, including the song lookup join
/// - Load: execute invocations inside the caller's transaction
pub mod discover;
pub mod extract;
pub mod load;
pub mod transform;
