/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` (field `database_url` reads
/// `DATABASE_URL`) and call `Config::from_env()` once at startup. Defaults
/// are expressed with `#[serde(default = "...")]`.
///
/// # Panics
///
/// Panics if a required variable is missing or cannot be deserialized; a
/// service cannot start without its storage and bus endpoints.
pub trait Config: Sized + serde::de::DeserializeOwned {
    fn from_env() -> Self {
        Self::from_iter(std::env::vars())
    }

    /// Load from an explicit variable set (used by tests).
    fn from_iter<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        match envy::from_iter(vars) {
            Ok(config) => config,
            Err(e) => panic!("failed to load config from environment: {e}"),
        }
    }
}
