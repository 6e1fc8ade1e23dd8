use crate::error::AccountError;

/// Turns passwords into storable hashes and checks them later.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AccountError>;

    /// `false` for a wrong password or an unreadable stored hash.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// bcrypt with a per-hash random salt, stored in the modular `$2b$` format.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// `cost` must lie within bcrypt's 4..=31; anything else fails at hash time.
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AccountError> {
        bcrypt::hash(password, self.cost).map_err(|e| AccountError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        bcrypt::verify(password, stored).unwrap_or(false)
    }
}
