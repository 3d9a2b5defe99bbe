//! iOS Toolchain Support
//!
//! Handles everything upstream of the native build:
//! - Downloading the pjproject source archive
//! - Extracting it into the source tree
//! - Writing the iOS configuration header
//! - Target triples and their build environment
//! - Locating required programs

pub mod configure;
pub mod detector;
pub mod downloader;
pub mod env;
pub mod extractor;
pub mod ios;

pub use detector::{ToolchainDetector, ToolInfo, DetectionError};
pub use downloader::{SourceFetcher, FetchOutcome, DownloadError, ProgressCallback};
pub use env::EnvManager;
pub use extractor::extract_tar_bz2;
pub use ios::{Platform, TargetTriple, TripleSet};
