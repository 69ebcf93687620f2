pub mod fetcher;
pub mod git;
