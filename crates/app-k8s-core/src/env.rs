use std::{env, fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};

/// Reads an environment variable, failing if it is unset or not valid unicode.
pub fn infer_string(key: &str) -> Result<String> {
    env::var(key).map_err(|error| anyhow!("failed to find the environment variable {key}: {error}"))
}

/// Parses an environment variable, failing if it is unset or malformed.
pub fn infer<R>(key: &str) -> Result<R>
where
    R: FromStr,
    <R as FromStr>::Err: fmt::Display,
{
    infer_string(key).and_then(|value| parse(key, &value))
}

/// Like [`infer`], but an unset (or empty) variable yields `None`.
///
/// A present but malformed value is still an error.
pub fn infer_opt<R>(key: &str) -> Result<Option<R>>
where
    R: FromStr,
    <R as FromStr>::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => parse(key, &value).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(error) => bail!("failed to read the environment variable {key}: {error}"),
    }
}

fn parse<R>(key: &str, value: &str) -> Result<R>
where
    R: FromStr,
    <R as FromStr>::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|error| anyhow!("failed to parse the environment variable {key}={value:?}: {error}"))
}
