use std::env;
use std::fmt;

use rand::seq::SliceRandom;
use research_chat_model::ModelProvider;

use crate::error::Error;
use crate::model_client::ModelClient;

/// An API key for the model service.
///
/// The secret never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Creates a credential from a raw secret.
    #[inline]
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret.
    #[inline]
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Reads a credential from the environment variable `var`.
    ///
    /// A missing or blank variable is a configuration error.
    pub fn from_env(var: &str) -> Result<Self, Error> {
        match env::var(var) {
            Ok(secret) if !secret.trim().is_empty() => {
                Ok(Self(secret.trim().to_owned()))
            }
            _ => Err(Error::configuration()
                .with_reason(format!("environment variable {var} is not set"))),
        }
    }

    /// Reads `count` credentials from `{prefix}1` up to `{prefix}{count}`,
    /// failing on the first missing one.
    pub fn load_numbered(prefix: &str, count: usize) -> Result<Vec<Self>, Error> {
        (1..=count)
            .map(|n| Self::from_env(&format!("{prefix}{n}")))
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// An ordered collection of model clients, one per credential.
///
/// The pool is read-only after construction and can be shared freely
/// between concurrent calls.
#[derive(Clone, Default)]
pub struct CredentialPool {
    clients: Vec<ModelClient>,
}

impl CredentialPool {
    /// Creates a pool with one client per credential, using `make_provider`
    /// to bind a provider to each of them.
    pub fn new<P, F>(credentials: &[Credential], mut make_provider: F) -> Self
    where
        P: ModelProvider + 'static,
        F: FnMut(&Credential) -> P,
    {
        let clients = credentials
            .iter()
            .map(|credential| ModelClient::new(make_provider(credential)))
            .collect();
        Self { clients }
    }

    /// Creates a pool from providers that are already bound to their
    /// credentials.
    pub fn from_providers<P, I>(providers: I) -> Self
    where
        P: ModelProvider + 'static,
        I: IntoIterator<Item = P>,
    {
        Self::from_clients(providers.into_iter().map(ModelClient::new).collect())
    }

    /// Creates a pool from existing clients.
    #[inline]
    pub fn from_clients(clients: Vec<ModelClient>) -> Self {
        Self { clients }
    }

    /// Returns the number of clients.
    #[inline]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if the pool holds no client.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns every client together with its position in the pool, in a
    /// fresh random order.
    pub fn shuffled(&self) -> Vec<(usize, &ModelClient)> {
        let mut clients: Vec<_> = self.clients.iter().enumerate().collect();
        clients.shuffle(&mut rand::thread_rng());
        clients
    }

    /// Returns one client chosen uniformly at random.
    pub fn pick(&self) -> Option<&ModelClient> {
        self.clients.choose(&mut rand::thread_rng())
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use research_chat_test_model::TestModelProvider;

    use super::*;

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("super-secret");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
        assert_eq!(credential.secret(), "super-secret");
    }

    #[test]
    fn test_missing_credential() {
        let err = Credential::from_env("RESEARCH_CHAT_TEST_MISSING_KEY_")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(err.reason().contains("RESEARCH_CHAT_TEST_MISSING_KEY_"));

        let err = Credential::load_numbered("RESEARCH_CHAT_TEST_MISSING_KEY_", 3)
            .unwrap_err();
        assert!(err.reason().ends_with("RESEARCH_CHAT_TEST_MISSING_KEY_1 is not set"));
    }

    #[test]
    fn test_pool_construction() {
        let credentials = [Credential::new("a"), Credential::new("b")];
        let mut seen = vec![];
        let pool = CredentialPool::new(&credentials, |credential| {
            seen.push(credential.secret().to_owned());
            TestModelProvider::default()
        });
        assert_eq!(pool.len(), 2);
        assert_eq!(seen, ["a", "b"]);

        let empty = CredentialPool::from_clients(vec![]);
        assert!(empty.is_empty());
        assert!(empty.pick().is_none());
    }

    #[test]
    fn test_shuffled_visits_every_client() {
        let pool = CredentialPool::from_providers(
            (0..5).map(|_| TestModelProvider::default()),
        );
        for _ in 0..10 {
            let indices: HashSet<_> =
                pool.shuffled().into_iter().map(|(idx, _)| idx).collect();
            assert_eq!(indices, HashSet::from([0, 1, 2, 3, 4]));
        }
    }
}
