//! Multipart form inputs.

use std::collections::BTreeMap;

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub filename: String,
    pub fieldname: String,
    pub data: Vec<u8>,
}

impl File {
    pub fn new(fieldname: impl Into<String>, filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            fieldname: fieldname.into(),
            data: data.into(),
        }
    }
}

/// Files and plain form fields for a `multipart/form-data` body.
///
/// Form fields are written first, in key order, followed by the files in the
/// order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    pub files: Vec<File>,
    pub form: BTreeMap<String, String>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }
}
