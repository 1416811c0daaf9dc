pub mod checkpoint;
pub mod dedup;
pub mod error;
pub mod indicator;
pub mod obligation;
pub mod section;
pub mod similarity;
pub mod utils;

pub use checkpoint::Checkpoint;
pub use dedup::DedupMap;
pub use error::{
    ErrorCategory, ErrorClassifier, LlmError, PipelineError, Result, ResultExt, ValidationError,
    ValidationErrorKind,
};
pub use indicator::{
    AnachronismAnalysis, Complexity, Highlight, ImplementationAnalysis, Indicator, ReportingRecord,
};
pub use obligation::{Obligation, ObligationCategory, ObligationValue};
pub use section::{CrossReference, Jurisdiction, Section, SectionId, StructureKind, StructureNode};
pub use similarity::{Classification, ClassificationKind, SimilarityPair};
pub use utils::{
    enum_to_str, json_bool, json_f64, json_i64, json_string, json_string_array, json_string_or,
    log_filter_error, log_filter_warn,
};
