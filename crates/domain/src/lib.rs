pub mod error;
pub mod io;
pub mod labels;
pub mod prediction;

pub use crate::error::{ErrorKind, RecognizerError};
pub use crate::io::{
    EmotionReport, ErrorReport, JsonExporter, ReportExporter, ReportFormat, Response,
};
pub use crate::labels::LabelEncoder;
pub use crate::prediction::{Prediction, ProbabilityMap};
