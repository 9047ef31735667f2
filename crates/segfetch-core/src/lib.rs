pub mod config;
pub mod logging;

pub mod checksum;
pub mod downloader;
pub mod error;
pub mod fetch_head;
pub mod fetcher;
pub mod job;
pub mod monitor;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod reassemble;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod url_model;

pub use error::FetchError;
pub use fetcher::{DownloadMode, DownloadReport, Fetcher};
pub use job::DownloadJob;
pub use progress::{ChannelProgress, NoopProgress, ProgressSink, ProgressStats};
