use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("No output named {0} has been recorded yet")]
    UnknownOutput(String),

    #[error("Output {0} is a list and cannot be spliced into a string")]
    NotAScalar(String),

    #[error("Unterminated ${{...}} placeholder in `{0}`")]
    UnterminatedPlaceholder(String),

    #[error("Failed to write the outputs file: {0}")]
    WriteError(String),
}

/// A single published output. Wrappers record either one identifier
/// (`vpc_id`) or a list of them (`subnet_ids`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Scalar(String),
    List(Vec<String>),
}

/// The mapping every resource wrapper publishes its identifiers into.
///
/// Later sections reference earlier identifiers through `${name}`
/// placeholders in their configuration, which `resolve` substitutes.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct OutputMap {
    values: BTreeMap<String, OutputValue>,
}

impl OutputMap {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn export(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        info!(output = %name, %value, "exported output");
        self.values.insert(name, OutputValue::Scalar(value));
    }

    pub fn export_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        info!(output = %name, count = values.len(), "exported output");
        self.values.insert(name, OutputValue::List(values));
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        return self.values.get(name);
    }

    /// Substitutes every `${name}` occurrence with a previously recorded
    /// scalar output.
    pub fn resolve(&self, raw: &str) -> Result<String, Error> {
        let mut resolved = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find("${") {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = match after.find('}') {
                Some(end) => end,
                None => return Err(Error::UnterminatedPlaceholder(raw.to_string())),
            };

            let name = &after[..end];
            match self.get(name) {
                Some(OutputValue::Scalar(value)) => resolved.push_str(value),
                Some(OutputValue::List(_)) => return Err(Error::NotAScalar(name.to_string())),
                None => return Err(Error::UnknownOutput(name.to_string())),
            }

            rest = &after[end + 1..];
        }

        resolved.push_str(rest);
        return Ok(resolved);
    }

    /// Resolves a list of references. An entry that is exactly one `${name}`
    /// placeholder naming a list output is spliced into the result whole.
    pub fn resolve_all(&self, raw: &[String]) -> Result<Vec<String>, Error> {
        let mut resolved = Vec::with_capacity(raw.len());

        for entry in raw {
            let name = entry
                .trim()
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .filter(|name| !name.contains('}'));

            if let Some(name) = name {
                if let Some(OutputValue::List(values)) = self.get(name) {
                    resolved.extend(values.iter().cloned());
                    continue;
                }
            }

            resolved.push(self.resolve(entry)?);
        }

        return Ok(resolved);
    }
}

pub fn write(path: &Path, outputs: &OutputMap) -> Result<(), Error> {
    let contents = match serde_json::to_string_pretty(outputs) {
        Ok(contents) => contents,
        Err(error) => return Err(Error::WriteError(error.to_string())),
    };

    match fs::write(path, contents) {
        Ok(_) => Ok(()),
        Err(error) => Err(Error::WriteError(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::{write, Error, OutputMap, OutputValue};
    use tempfile::tempdir;

    #[test]
    fn resolves_scalar_placeholders() {
        let mut outputs = OutputMap::new();
        outputs.export("vpc_id", "vpc-0123456789abcdef0");

        let resolved = outputs.resolve("${vpc_id}").unwrap();
        assert_eq!("vpc-0123456789abcdef0", resolved);

        let resolved = outputs.resolve("peer-${vpc_id}-link").unwrap();
        assert_eq!("peer-vpc-0123456789abcdef0-link", resolved);
    }

    #[test]
    fn leaves_literals_untouched() {
        let outputs = OutputMap::new();
        assert_eq!(
            "subnet-0abc".to_string(),
            outputs.resolve("subnet-0abc").unwrap()
        );
    }

    #[test]
    fn unknown_output_is_an_error() {
        let outputs = OutputMap::new();
        assert_eq!(
            Err(Error::UnknownOutput(String::from("vpc_id"))),
            outputs.resolve("${vpc_id}")
        );
    }

    #[test]
    fn list_output_in_scalar_position_is_an_error() {
        let mut outputs = OutputMap::new();
        outputs.export_list(
            "subnet_ids",
            vec![String::from("subnet-1"), String::from("subnet-2")],
        );

        assert_eq!(
            Err(Error::NotAScalar(String::from("subnet_ids"))),
            outputs.resolve("${subnet_ids}")
        );
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let outputs = OutputMap::new();
        match outputs.resolve("${vpc_id").err().unwrap() {
            Error::UnterminatedPlaceholder(_) => {}
            _ => panic!("Expected `UnterminatedPlaceholder` error"),
        }
    }

    #[test]
    fn splices_list_outputs_into_reference_lists() {
        let mut outputs = OutputMap::new();
        outputs.export_list(
            "subnet_ids",
            vec![String::from("subnet-1"), String::from("subnet-2")],
        );
        outputs.export("web-server-sg_sg_id", "sg-0abc");

        let resolved = outputs
            .resolve_all(&[
                String::from("${subnet_ids}"),
                String::from("${web-server-sg_sg_id}"),
                String::from("subnet-3"),
            ])
            .unwrap();

        assert_eq!(vec!["subnet-1", "subnet-2", "sg-0abc", "subnet-3"], resolved);
    }

    #[test]
    fn writes_the_outputs_file() {
        let mut outputs = OutputMap::new();
        outputs.export("vpc_id", "vpc-0123");
        outputs.export_list("bucket_names", vec![String::from("myapp-dev-data")]);

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("outputs.json");

        write(&file_path, &outputs).unwrap();

        let contents = fs::read_to_string(&file_path).unwrap();
        let parsed: BTreeMap<String, OutputValue> = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            Some(&OutputValue::Scalar(String::from("vpc-0123"))),
            parsed.get("vpc_id")
        );
        assert_eq!(
            Some(&OutputValue::List(vec![String::from("myapp-dev-data")])),
            parsed.get("bucket_names")
        );
    }
}
