pub mod etl;
pub mod normalize;
pub mod pipeline;
pub mod spot_check;

pub use crate::domain::model::{Record, SheetData, Table, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, TableSink};
pub use crate::utils::error::Result;
