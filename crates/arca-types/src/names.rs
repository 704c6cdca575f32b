//! Validated names for namespaces, buckets, and reference keys.
//!
//! Namespace and bucket names:
//! - Must be non-empty and at most 64 bytes
//! - May contain only lowercase ASCII letters, digits, `.`, `_`, and `-`
//! - Namespaces must not start with `.`
//!
//! Reference keys are opaque, but must be non-empty, at most 256 bytes, and
//! free of `/` and control characters so they can appear in a URL path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const MAX_NAME_LEN: usize = 64;
const MAX_KEY_LEN: usize = 256;

fn validate_name(kind: &'static str, name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!("longer than {MAX_NAME_LEN} bytes")));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $validate:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name.
            pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
                let name = name.into();
                let validate: fn(&str) -> Result<(), TypeError> = $validate;
                validate(&name)?;
                Ok(Self(name))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($kind, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type!(
    /// Top-level data-isolation boundary. No identifiers or data are shared
    /// across namespaces.
    NamespaceId,
    "NamespaceId",
    |name| {
        validate_name("namespace", name)?;
        if name.starts_with('.') {
            return Err(TypeError::InvalidName {
                kind: "namespace",
                name: name.to_string(),
                reason: "must not start with '.'".into(),
            });
        }
        Ok(())
    }
);

name_type!(
    /// Named partition of keys within a namespace.
    BucketId,
    "BucketId",
    |name| validate_name("bucket", name)
);

name_type!(
    /// Opaque key, unique within a (namespace, bucket).
    RefKey,
    "RefKey",
    |key| {
        let invalid = |reason: &str| TypeError::InvalidName {
            kind: "key",
            name: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(invalid("longer than 256 bytes"));
        }
        if key.chars().any(|c| c == '/' || c.is_control()) {
            return Err(invalid("must not contain '/' or control characters"));
        }
        Ok(())
    }
);
