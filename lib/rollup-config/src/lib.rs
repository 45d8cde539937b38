//! Layered configuration loading.
//!
//! Configuration is assembled from any number of sources (YAML files, JSON files, prefixed environment variables) and
//! then either extracted directly into a typed value or kept around as a [`GenericConfiguration`] that individual
//! components query for the keys they care about.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, path::Path, sync::Arc};

use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider as _,
};
use serde::Deserialize;
use snafu::{IntoError as _, ResultExt as _, Snafu};
use tracing::debug;

mod provider;
use self::provider::FileProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A configuration file could not be read or parsed.
    #[snafu(display("Failed to load configuration file '{}': {}", path, source))]
    File {
        /// Path of the file.
        path: String,

        /// Error source.
        source: figment::Error,
    },

    /// A required field was not present in any source.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Name of the missing field.
        field: Cow<'static, str>,

        /// Hint describing the keys that would satisfy the lookup.
        help_text: String,
    },

    /// A field was present but held a value of the wrong type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other extraction failure.
    #[snafu(display("Failed to extract configuration: {}", source))]
    Extract {
        /// Error source.
        source: figment::Error,
    },
}

/// A configuration loader that merges several sources.
///
/// Sources are applied in the order they are added, and sources added later take precedence over those added
/// earlier. A typical setup loads a file and then the environment, so that environment variables override the file:
///
/// ```no_run
/// # use rollup_config::ConfigurationLoader;
/// # fn main() -> Result<(), rollup_config::ConfigurationError> {
/// let config = ConfigurationLoader::default()
///     .try_from_yaml("/etc/rollup/rollup.yaml")
///     .from_environment("ROLLUP")?
///     .into_generic();
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConfigurationLoader {
    figment: Figment,
    env_prefix: Option<String>,
}

impl ConfigurationLoader {
    fn merge<P: figment::Provider>(mut self, provider: P) -> Self {
        self.figment = self.figment.admerge(provider);
        self
    }

    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or is not valid YAML, an error will be returned.
    pub fn from_yaml<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigurationError> {
        let provider = FileProvider::yaml(&path).context(File {
            path: path.as_ref().display().to_string(),
        })?;
        Ok(self.merge(provider))
    }

    /// Loads the given YAML configuration file if it exists and is valid, otherwise leaves the loader unchanged.
    pub fn try_from_yaml<P: AsRef<Path>>(self, path: P) -> Self {
        match FileProvider::yaml(&path) {
            Ok(provider) => self.merge(provider),
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().display(), "Skipping unreadable YAML configuration file.");
                self
            }
        }
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or is not valid JSON, an error will be returned.
    pub fn from_json<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigurationError> {
        let provider = FileProvider::json(&path).context(File {
            path: path.as_ref().display().to_string(),
        })?;
        Ok(self.merge(provider))
    }

    /// Loads configuration from environment variables starting with the given prefix.
    ///
    /// An underscore is appended to the prefix unless it already ends with one, so a prefix of `ROLLUP` matches
    /// `ROLLUP_FLUSH_INTERVAL_SECS`, which is then visible as the key `flush_interval_secs`.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment could not be read, an error will be returned.
    pub fn from_environment(mut self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return EmptyPrefix.fail();
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // The environment is snapshotted here so that later changes to it don't leak into an already-built loader.
        let values = Env::prefixed(&prefix).data().context(Extract)?;
        if let Some(dict) = values.get(&figment::Profile::Default) {
            self = self.merge(Serialized::defaults(dict.clone()));
        }
        self.env_prefix = Some(prefix);
        Ok(self)
    }

    /// Adds in-memory values as the lowest-priority source.
    ///
    /// Useful for supplying programmatic defaults, or for building configuration in tests.
    pub fn with_defaults<T: serde::Serialize>(mut self, defaults: T) -> Self {
        self.figment = Figment::from(Serialized::defaults(defaults)).admerge(self.figment);
        self
    }

    /// Consumes the loader, deserializing the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T: Deserialize<'a>>(self) -> Result<T, ConfigurationError> {
        self.into_generic().as_typed()
    }

    /// Consumes the loader, wrapping the merged configuration for key-based querying.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment: self.figment,
                env_prefix: self.env_prefix,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    env_prefix: Option<String>,
}

/// Merged configuration, queryable by key.
///
/// Keys use periods to address nested values: given `{"collector": {"staleness_timeout_secs": 30}}`, the key
/// `collector.staleness_timeout_secs` resolves to `30`. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T: Deserialize<'a>>(&self, key: &str) -> Result<T, ConfigurationError> {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) if matches!(e.kind, Kind::MissingField(_)) => {
                // Environment variables can't express nesting, so `a.b` may only exist as the flat key `a_b`.
                let flat_key = key.replace('.', "_");
                self.inner
                    .figment
                    .extract_inner(&flat_key)
                    .map_err(|e| self.convert_error(e, Some(key)))
            }
            Err(e) => Err(self.convert_error(e, Some(key))),
        }
    }

    /// Gets a configuration value by key.
    ///
    /// # Errors
    ///
    /// If the key does not exist, or its value could not be deserialized into `T`, an error will be returned.
    pub fn get_typed<'a, T: Deserialize<'a>>(&self, key: &str) -> Result<T, ConfigurationError> {
        self.get(key)
    }

    /// Gets a configuration value by key, returning `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// If the key exists but its value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T: Deserialize<'a>>(&self, key: &str) -> Result<Option<T>, ConfigurationError> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deserializes the entire configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T: Deserialize<'a>>(&self) -> Result<T, ConfigurationError> {
        self.inner.figment.extract().map_err(|e| self.convert_error(e, None))
    }

    fn convert_error(&self, e: figment::Error, key: Option<&str>) -> ConfigurationError {
        match e.kind {
            Kind::MissingField(field) => {
                let field = match key {
                    Some(key) => Cow::Owned(key.to_string()),
                    None => field,
                };
                let mut candidates = vec![field.to_string()];
                if let Some(prefix) = &self.inner.env_prefix {
                    candidates.push(format!("{}{}", prefix, field.replace('.', "_").to_uppercase()));
                }
                let help_text = format!("Try setting `{}`.", candidates.join("` or `"));
                MissingField { field, help_text }.build()
            }
            Kind::InvalidType(actual_ty, expected_ty) => InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            }
            .build(),
            _ => Extract.into_error(e),
        }
    }
}
