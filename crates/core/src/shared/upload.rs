use crate::shared::names::{validate_segment, NameError};

/// Raw bytes handed over by the front-end, tagged with the client-side
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, NameError> {
        let file_name = file_name.into();
        validate_segment(&file_name)?;
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
