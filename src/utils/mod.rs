//! Utility modules for TCG Scrape
//!
//! This module contains various utility functions organized by functionality:
//! - `files`: Output directory management and file naming
//! - `http`: HTTP fetching and streamed downloads
//! - `throttle`: Politeness delays between requests

pub mod files;
pub mod http;
pub mod throttle;
