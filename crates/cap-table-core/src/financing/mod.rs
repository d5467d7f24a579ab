pub mod cap_table;
pub mod note;
pub mod organization;
pub mod share_class;

pub use cap_table::{build_cap_table, CapTable, CapTableInput, CapTableSummary, SolverSettings};
pub use note::{convert_note, ConversionContext, ConversionMethod, ConversionOutcome, Note};
pub use organization::{NoteTerms, Organization};
pub use share_class::{ShareClass, ShareClassKind};
