pub mod cli;
pub mod codec;
pub mod constants;
pub mod convert;
pub mod error;
pub mod estimate;
pub mod expand;
pub mod formats;
pub mod logger;
pub mod probe;
pub mod quality;
pub mod scan;
pub mod session;
pub mod source;
pub mod utils;

pub use codec::{ImageCodec, JpegCodec};
pub use convert::{
    assign_output_names, BatchConverter, ConversionJob, ConversionResult, ExportOptions,
    PackageLayout,
};
pub use error::{
    ConvertError, ExpansionFailure, ItemFailure, ItemStage, ProbeFailure, Result, SystemicFailure,
};
pub use estimate::{estimate, estimate_entry_size, EstimateTicket, EstimateTracker, SizeEstimate};
pub use expand::{expand_paths, Container, Expansion};
pub use formats::SourceFormat;
pub use probe::{probe, probe_all, ProbeOptions};
pub use quality::Quality;
pub use scan::{expand_and_probe, ScanOptions, ScanReport};
pub use session::Workspace;
pub use source::{SourceEntry, SourceLocation};
