use std::fs::File;
use std::path::Path;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const PROPERTY_ID_COL: &str = "property_id";
pub const ADDRESS_COL: &str = "property_address";

/// One source row. Columns other than these two are ignored.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InputRecord {
    pub property_id: String,
    #[serde(default)]
    pub property_address: Option<String>,
}

/// One output row; written by the checkpoint writer in this column order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResultRecord {
    pub property_id: String,
    pub property_address: Option<String>,
    pub standardized_address: String,
}

impl ResultRecord {
    pub fn new(input: InputRecord, standardized_address: impl Into<String>) -> Self {
        ResultRecord {
            property_id: input.property_id,
            property_address: input.property_address,
            standardized_address: standardized_address.into(),
        }
    }
}

/// Loads the full input table, in file order.
pub fn load_records<P: AsRef<Path>>(filename: P) -> Result<Vec<InputRecord>, PipelineError> {
    let path = filename.as_ref();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::InputNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    for required in [PROPERTY_ID_COL, ADDRESS_COL] {
        if !headers.iter().any(|h| h == required) {
            return Err(PipelineError::Config(format!(
                "input file {:?} has no `{}` column",
                path, required
            )));
        }
    }

    let mut records = Vec::new();
    for result in rdr.deserialize::<InputRecord>() {
        let mut record = result?;
        record.property_address = record.property_address.filter(|a| !a.is_empty());
        records.push(record);
    }
    info!("Loaded {} records from CSV {:?}", records.len(), path);
    Ok(records)
}
