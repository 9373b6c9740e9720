use crate::credentials::Credentials;
use crate::store::Storage;

/// The two capabilities every log operation needs, passed explicitly.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub store: &'a dyn Storage,
    pub credentials: &'a dyn Credentials,
}

impl<'a> Context<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Storage, credentials: &'a dyn Credentials) -> Self {
        Self { store, credentials }
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}
