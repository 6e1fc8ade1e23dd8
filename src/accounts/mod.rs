mod hasher;
mod service;
mod token;
mod validation;

pub use hasher::{BcryptHasher, CredentialHasher};
pub use service::{
    require_webcam_consent, set_webcam_consent, AccountService, AuthSession, RegistrationForm,
};
pub use token::{Claims, TokenIssuer, SECRET_ENV};
pub use validation::{validate_email, validate_password, validate_registration, validate_username};
