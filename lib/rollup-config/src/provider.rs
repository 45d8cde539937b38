use std::path::Path;

use figment::{
    providers::{Data, Format, Json, Yaml},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};

/// A provider whose data was read and parsed when it was constructed.
///
/// Reading eagerly means a missing or malformed file is reported by the loader call that named it, rather than later
/// when the merged configuration is first extracted.
pub struct FileProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl FileProvider {
    fn load<F, P>(path: P, kind: &'static str) -> Result<Self, Error>
    where
        F: Format,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::from(e.to_string()))?;
        let data = Data::<F>::string(&contents).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from(kind, path),
        })
    }

    pub fn yaml<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load::<Yaml, _>(path, "YAML file")
    }

    pub fn json<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load::<Json, _>(path, "JSON file")
    }
}

impl Provider for FileProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}
