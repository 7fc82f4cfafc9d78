//! Environment-backed configuration.
//!
//! Variables are read once (after loading a `.env` file, if any) and deserialized into [`Env`]
//! through a small serde deserializer over `(key, value)` pairs. Only keys carrying
//! [`ENV_PREFIX`] are considered, and the prefix is stripped before field matching, so
//! `STREAKBOARD_BACKEND_URL` lands in `Env::backend_url`.

use std::borrow::Cow;
use std::sync::LazyLock;

use serde::Deserialize;
use serde::de::value::MapDeserializer;
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

pub const ENV_PREFIX: &str = "STREAKBOARD_";
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Returns the process-wide configuration, reading it from the environment on first use.
pub async fn env() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

/// Looks up a single string variable. Optional variables that were not set produce
/// [`EnvErr::Unset`].
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = env().await?;
    let value = match var {
        Var::BackendUrl => Some(&vars.backend_url),
        Var::OAuthClientId => Some(&vars.oauth_client_id),
        Var::SessionCookie => vars.session_cookie.as_ref(),
        Var::DatabaseUrl => vars.database_url.as_ref(),
        Var::MigrationsDir => Some(&vars.migrations_dir),
        Var::OtelExporterEndpoint => vars.otel_exporter_endpoint.as_ref(),
    };

    value
        .map(String::as_str)
        .ok_or(EnvErr::Unset(var.key()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    #[serde(default)]
    pub mode: Mode,
    pub backend_url: String,
    pub oauth_client_id: String,
    pub session_cookie: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub database_url: Option<String>,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
    pub otel_exporter_endpoint: Option<String>,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(prefixed(ENV_PREFIX).from_iter(dotenvy::vars())?)
    }
}

#[inline]
fn default_migrations_dir() -> String {
    DEFAULT_MIGRATIONS_DIR.to_string()
}

/// Runtime mode the binary was started in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    BackendUrl,
    OAuthClientId,
    SessionCookie,
    DatabaseUrl,
    MigrationsDir,
    OtelExporterEndpoint,
}

impl Var {
    pub fn key(&self) -> &'static str {
        match self {
            Var::BackendUrl => "STREAKBOARD_BACKEND_URL",
            Var::OAuthClientId => "STREAKBOARD_OAUTH_CLIENT_ID",
            Var::SessionCookie => "STREAKBOARD_SESSION_COOKIE",
            Var::DatabaseUrl => "STREAKBOARD_DATABASE_URL",
            Var::MigrationsDir => "STREAKBOARD_MIGRATIONS_DIR",
            Var::OtelExporterEndpoint => "STREAKBOARD_OTEL_EXPORTER_ENDPOINT",
        }
    }
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

// ---
//  Deserializer implementation
// ---

/// A single variable's value, tagged with its key for error messages.
struct EnvValue {
    key: String,
    value: String,
}

struct EnvKey(String);

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for EnvValue {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for EnvKey {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! forward_parsed {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.value.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{e}: while parsing '{}' (variable: {})",
                        self.value, self.key
                    ))),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for EnvValue {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.value.into_deserializer().deserialize_any(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        // `FOO=` in a .env file means "unset"
        if self.value.trim().is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.value.trim().to_lowercase().into_deserializer())
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_parsed! {
        bool => deserialize_bool,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
    }

    serde::forward_to_deserialize_any! {
        i8 i16 u8 f32 f64 char str string unit bytes byte_buf map seq
        unit_struct tuple_struct identifier tuple ignored_any struct
    }
}

impl<'de> de::Deserializer<'de> for EnvKey {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map newtype_struct
        unit_struct tuple_struct identifier tuple ignored_any
        bool u8 u16 u32 u64 i8 i16 i32 i64 f32 f64 enum struct
    }
}

/// Top-level deserializer: presents the variables as a map.
struct EnvDeserializer<'de, I: Iterator<Item = (EnvKey, EnvValue)>> {
    inner: MapDeserializer<'de, I, EnvDeserializeError>,
}

impl<'de, I> de::Deserializer<'de> for EnvDeserializer<'de, I>
where
    I: Iterator<Item = (EnvKey, EnvValue)>,
{
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 i8 i16 i32 i64
        f32 f64 enum struct
    }
}

pub fn from_iter<I, T>(iter: I) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    I: IntoIterator<Item = (String, String)>,
{
    deserialize_vars(iter.into_iter().map(|(key, value)| (key.clone(), key, value)))
}

/// Deserializes `(field, variable, value)` triples: fields are matched on `field`, while errors
/// name the full `variable`.
fn deserialize_vars<I, T>(iter: I) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    I: Iterator<Item = (String, String, String)>,
{
    let vars = iter.map(|(field, key, value)| (EnvKey(field), EnvValue { key, value }));

    T::deserialize(EnvDeserializer {
        inner: MapDeserializer::new(vars),
    })
}

pub struct Prefixed<'a>(Cow<'a, str>);

impl Prefixed<'_> {
    #[allow(clippy::wrong_self_convention)]
    pub fn from_iter<I, T>(&self, iter: I) -> Result<T, EnvDeserializeError>
    where
        T: de::DeserializeOwned,
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = self.0.as_ref();
        let vars = iter.into_iter().filter_map(|(k, v)| {
            let field = k.strip_prefix(prefix)?.to_owned();
            Some((field, k, v))
        });

        deserialize_vars(vars).map_err(|e| match e {
            EnvDeserializeError::MissingValue(field) => {
                EnvDeserializeError::MissingValue(format!("{prefix}{field}"))
            }
            other => other,
        })
    }
}

pub fn prefixed<'a, C>(prefix: C) -> Prefixed<'a>
where
    C: Into<Cow<'a, str>>,
{
    Prefixed(prefix.into())
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),

    #[error("environment variable {0} is not set")]
    Unset(&'static str),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable: {0}")]
    MissingValue(String),
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}
