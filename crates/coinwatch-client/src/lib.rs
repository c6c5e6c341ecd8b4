pub mod fetcher;
pub mod patterns;

pub use fetcher::ReqwestFetcher;
pub use patterns::PatternExtractor;
