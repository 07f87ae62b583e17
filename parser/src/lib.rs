pub mod error;
pub mod model;
pub mod events;
pub mod scan;
pub mod detect;
pub mod pipeline;
pub mod bmo_chequing;
pub mod bmo_mastercard;
pub mod rbc_chequing;
pub mod rbc_visa;

mod utils;

pub use crate::detect::detect_variant;
pub use crate::error::ParseError;
pub use crate::events::{Event, Events};
pub use crate::model::{Amount, Balance, ExtractOptions, Transaction, VariantKind};
pub use crate::pipeline::{PageSource, ParsedStatement, TextPages, parse_pages, parse_statement};
pub use crate::scan::{PageScan, Variant, scan_page};
