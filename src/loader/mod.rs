//! Bulk loader framework (C3, spec §4.7): a generic checkpointed driver
//! loop plus per-table wiring over `Database::upsert_*`, invoked in
//! foreign-key order.

mod driver;
mod tables;

pub use driver::{LoaderDriver, LoaderRecord, LoaderReport};
pub use tables::{
    write_anachronisms, write_classifications, write_implementation, write_obligations,
    write_reporting, write_section_refs, write_sections, write_similarities, write_structure,
};
