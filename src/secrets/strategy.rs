//! # Credential Strategies
//!
//! Encoding of one credential kind into an opaque secret payload and back.
//!
//! The set of kinds is closed: [`CredentialStrategy`] is an enum, and both the
//! encode side (selected from [`Credentials`]) and the decode side (selected
//! from the `type` tag of [`AppCredentials`]) dispatch on it.

use crate::crd::{self, AppCredentials, CREDENTIALS_TYPE_BASIC, CREDENTIALS_TYPE_OAUTH};
use crate::error::AppError;
use crate::model::{BasicAuth, CredentialKind, Credentials, CredentialsInput, CsrfInfo, OAuth};
use std::collections::BTreeMap;

/// Secret payload: key to raw bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const CLIENT_ID_KEY: &str = "clientId";
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStrategy {
    Basic,
    OAuth,
}

impl CredentialStrategy {
    /// Select the strategy for raw credential input.
    ///
    /// Fails with `WrongInput` unless exactly one credential kind is set.
    pub fn from_input(input: &CredentialsInput) -> Result<Self, AppError> {
        match (&input.basic, &input.oauth) {
            (Some(_), None) => Ok(Self::Basic),
            (None, Some(_)) => Ok(Self::OAuth),
            (Some(_), Some(_)) => Err(AppError::wrong_input(
                "credentials must set exactly one of basic or oauth, both are set",
            )),
            (None, None) => Err(AppError::wrong_input(
                "credentials must set exactly one of basic or oauth, none is set",
            )),
        }
    }

    #[must_use]
    pub fn for_credentials(credentials: &Credentials) -> Self {
        match credentials.kind {
            CredentialKind::Basic(_) => Self::Basic,
            CredentialKind::OAuth(_) => Self::OAuth,
        }
    }

    /// Select the strategy that decodes a secret described by `app_credentials`
    pub fn for_app_credentials(app_credentials: &AppCredentials) -> Result<Self, AppError> {
        match app_credentials.credentials_type.as_str() {
            CREDENTIALS_TYPE_BASIC => Ok(Self::Basic),
            CREDENTIALS_TYPE_OAUTH => Ok(Self::OAuth),
            other => Err(AppError::internal(format!(
                "unknown credentials type '{other}'"
            ))),
        }
    }

    /// Tag stored in [`AppCredentials`]
    #[must_use]
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Basic => CREDENTIALS_TYPE_BASIC,
            Self::OAuth => CREDENTIALS_TYPE_OAUTH,
        }
    }

    fn tracked_keys(self) -> [&'static str; 2] {
        match self {
            Self::Basic => [USERNAME_KEY, PASSWORD_KEY],
            Self::OAuth => [CLIENT_ID_KEY, CLIENT_SECRET_KEY],
        }
    }

    /// True only when the credentials are of this kind and every required
    /// field is non-empty
    #[must_use]
    pub fn credentials_provided(self, credentials: &Credentials) -> bool {
        match (self, &credentials.kind) {
            (Self::Basic, CredentialKind::Basic(basic)) => {
                !basic.username.is_empty() && !basic.password.is_empty()
            }
            (Self::OAuth, CredentialKind::OAuth(oauth)) => {
                !oauth.url.is_empty()
                    && !oauth.client_id.is_empty()
                    && !oauth.client_secret.is_empty()
            }
            _ => false,
        }
    }

    pub fn create_secret_data(self, credentials: &Credentials) -> Result<SecretData, AppError> {
        let (first, second) = match (self, &credentials.kind) {
            (Self::Basic, CredentialKind::Basic(basic)) => (&basic.username, &basic.password),
            (Self::OAuth, CredentialKind::OAuth(oauth)) => {
                (&oauth.client_id, &oauth.client_secret)
            }
            _ => {
                return Err(AppError::internal(format!(
                    "{} strategy cannot encode these credentials",
                    self.type_tag()
                )))
            }
        };

        let [first_key, second_key] = self.tracked_keys();
        Ok(SecretData::from([
            (first_key.to_string(), first.as_bytes().to_vec()),
            (second_key.to_string(), second.as_bytes().to_vec()),
        ]))
    }

    /// Summary stored on the Application CR in place of the secret values
    #[must_use]
    pub fn to_credentials_info(self, credentials: &Credentials, secret_name: &str) -> AppCredentials {
        let authentication_url = match &credentials.kind {
            CredentialKind::OAuth(oauth) => oauth.url.clone(),
            CredentialKind::Basic(_) => String::new(),
        };

        AppCredentials {
            credentials_type: self.type_tag().to_string(),
            secret_name: secret_name.to_string(),
            authentication_url,
            csrf_info: credentials.csrf_info.as_ref().map(|csrf| crd::CsrfInfo {
                token_endpoint_url: csrf.token_endpoint_url.clone(),
            }),
        }
    }

    /// True iff any tracked key differs between `current` and `new`
    #[must_use]
    pub fn should_update(self, current: &SecretData, new: &SecretData) -> bool {
        self.tracked_keys()
            .iter()
            .any(|key| current.get(*key) != new.get(*key))
    }

    /// Rebuild credentials from a stored secret and its summary
    pub fn to_credentials(
        self,
        data: &SecretData,
        app_credentials: &AppCredentials,
    ) -> Result<Credentials, AppError> {
        let [first_key, second_key] = self.tracked_keys();
        let first = read_string(data, first_key)?;
        let second = read_string(data, second_key)?;

        let kind = match self {
            Self::Basic => CredentialKind::Basic(BasicAuth {
                username: first,
                password: second,
            }),
            Self::OAuth => CredentialKind::OAuth(OAuth {
                url: app_credentials.authentication_url.clone(),
                client_id: first,
                client_secret: second,
            }),
        };

        Ok(Credentials {
            kind,
            csrf_info: app_credentials.csrf_info.as_ref().map(|csrf| CsrfInfo {
                token_endpoint_url: csrf.token_endpoint_url.clone(),
            }),
        })
    }
}

fn read_string(data: &SecretData, key: &str) -> Result<String, AppError> {
    let Some(bytes) = data.get(key) else {
        return Ok(String::new());
    };
    String::from_utf8(bytes.clone())
        .map_err(|e| AppError::internal(format!("secret key '{key}' is not valid UTF-8: {e}")))
}
