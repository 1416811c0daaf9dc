//! Cheap pre-filters that run ahead of the expensive LLM stages: S6's
//! regex disjunction and S7's cross-encoder indicator scoring (spec
//! §4.6).

mod cross_encoder;
mod extract;
mod regex_filter;

pub use cross_encoder::{
    CrossEncoder, LexicalOverlapEncoder, REPORTING_INDICATORS, max_indicator_score, passes,
};
pub use extract::{extract_obligations, extract_references};
pub use regex_filter::RegexFilter;
