//! Reading and writing messages as files.

use crate::error::{Error, Result};
use prost::Message;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Decodes one message from the whole content of `path`
pub fn read_message<M: Message + Default>(path: impl AsRef<Path>) -> Result<M> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(M::decode(data.as_slice())?)
}

/// Encodes `message` into `path`, creating missing parent directories
pub fn write_message<M: Message>(path: impl AsRef<Path>, message: &M) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
    }
    let data = message.encode_to_vec();
    fs::write(path, &data).map_err(|e| Error::file_write(path, e))?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionVariable, Instance, Linear, Sense};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/instance.ommx");
        let instance = Instance::new(Sense::Minimize, Linear::single_term(0, 1.0))
            .with_decision_variable(DecisionVariable::binary(0));

        write_message(&path, &instance).unwrap();
        let read: Instance = read_message(&path).unwrap();
        assert_eq!(read, instance);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_message::<Instance>(dir.path().join("missing.ommx")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_read_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.ommx");
        fs::write(&path, [0x0A, 0x05]).unwrap();
        let err = read_message::<Instance>(&path).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.is_recoverable());
    }
}
