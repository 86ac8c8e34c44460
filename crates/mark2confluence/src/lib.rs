pub mod config;
pub mod directive;
pub mod discovery;
pub mod error;
pub mod header;
pub mod inject;
pub mod pipeline;
pub mod publisher;
pub mod rules;
pub mod template;

pub use config::{Action, GithubContext, Inputs, Settings};
pub use directive::ParentDirective;
pub use discovery::{DiscoveryFilter, collect_files, search_doc_dir};
pub use error::{HeaderError, SetupError, UnterminatedComment};
pub use header::{
    KNOWN_HEADER_KEYS, declares_own_metadata, find_content_start_index, has_any_known_header,
    has_known_header,
};
pub use inject::{insert_at, insert_before_content, prepend_parent_header};
pub use pipeline::{FailureReason, FileReport, FileStatus, Pipeline, RunSummary};
pub use publisher::{MarkPublisher, PUBLISH_TIMEOUT, PublishFailure, Publisher};
pub use rules::ParentRuleSet;
pub use template::{BannerContext, DEFAULT_HEADER_TEMPLATE, HeaderTemplate, source_link};
